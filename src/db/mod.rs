//! Query execution layer for sql-quest.
//!
//! Provides a trait-based interface for running learner SQL, so the
//! verifier can be driven by the real SQLite sandbox or a scripted mock.

mod mock;
mod sandbox;
mod types;

pub use mock::{FailingExecutor, MockExecutor};
pub use sandbox::{SandboxConfig, SqliteSandbox, DEFAULT_PROGRESS_INTERVAL, DEFAULT_TIMEOUT_MS};
pub use types::{Cell, ExecutionOutcome, QueryResult, Row, ShapeError};

use crate::error::ExecutionError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Trait defining the interface for query executors.
///
/// Implementations must isolate runs from each other: a mutating statement in
/// one call is never visible to the next.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs `sql`, honoring `cancel`, and returns the last statement's result.
    async fn execute(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ExecutionError>;

    /// Runs `sql` with writes refused.
    ///
    /// Fails with [`ExecutionErrorKind::ReadOnly`] if any statement tried to
    /// change data or schema. The default checks the classification after
    /// the run; engines that can refuse writes themselves should override it.
    ///
    /// [`ExecutionErrorKind::ReadOnly`]: crate::error::ExecutionErrorKind::ReadOnly
    async fn execute_read_only(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let outcome = self.execute(sql, cancel).await?;
        if outcome.classification.contains_mutation() {
            return Err(ExecutionError::read_only());
        }
        Ok(outcome)
    }

    /// Runs `sql` and returns only its result set.
    async fn run(&self, sql: &str) -> Result<QueryResult, ExecutionError> {
        let outcome = self.execute(sql, &CancellationToken::new()).await?;
        Ok(outcome.result)
    }
}
