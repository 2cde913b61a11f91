//! sql-quest: a sandboxed SQL puzzle game.
//!
//! Learner SQL runs against a throwaway SQLite fixture, and the result is
//! compared with each level's expected result to produce a verdict and hint.

pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod output;
pub mod persistence;
pub mod safety;
pub mod scenario;
pub mod session;
pub mod verify;
