//! Integration tests for sql-quest.

pub mod progress_test;
pub mod sandbox_test;
pub mod verify_test;
