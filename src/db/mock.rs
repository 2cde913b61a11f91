//! Mock executors for testing.
//!
//! Provide scripted results so the verifier and session can be exercised
//! without loading a fixture.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{ExecutionOutcome, QueryExecutor, QueryResult};
use crate::error::ExecutionError;
use crate::safety::SqlClassifier;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// An executor that returns predefined results keyed by the submitted SQL.
///
/// Unscripted SQL yields an empty result. Every submission is recorded so
/// tests can assert on what was run.
pub struct MockExecutor {
    responses: HashMap<String, Result<QueryResult, ExecutionError>>,
    classifier: SqlClassifier,
    history: Mutex<Vec<String>>,
}

impl MockExecutor {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            classifier: SqlClassifier::new(),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Scripts a successful result for `sql`.
    pub fn with_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.responses.insert(normalize(&sql.into()), Ok(result));
        self
    }

    /// Scripts a failure for `sql`.
    pub fn with_error(mut self, sql: impl Into<String>, error: ExecutionError) -> Self {
        self.responses.insert(normalize(&sql.into()), Err(error));
        self
    }

    /// Returns every SQL string this mock has been asked to run.
    pub fn history(&self) -> Vec<String> {
        self.history
            .lock()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

impl Default for MockExecutor {
    fn default() -> Self {
        Self::new()
    }
}

fn normalize(sql: &str) -> String {
    sql.trim().trim_end_matches(';').trim().to_string()
}

#[async_trait]
impl QueryExecutor for MockExecutor {
    async fn execute(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        if let Ok(mut history) = self.history.lock() {
            history.push(sql.to_string());
        }

        if cancel.is_cancelled() {
            return Err(ExecutionError::cancelled());
        }

        let result = match self.responses.get(&normalize(sql)) {
            Some(scripted) => scripted.clone()?,
            None => QueryResult::new(),
        };

        Ok(ExecutionOutcome {
            result,
            execution_time: Duration::from_millis(1),
            classification: self.classifier.classify(sql),
        })
    }
}

/// An executor whose every run fails with the same error.
pub struct FailingExecutor {
    error: ExecutionError,
}

impl FailingExecutor {
    pub fn new(error: ExecutionError) -> Self {
        Self { error }
    }
}

#[async_trait]
impl QueryExecutor for FailingExecutor {
    async fn execute(
        &self,
        _sql: &str,
        _cancel: &CancellationToken,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        Err(self.error.clone())
    }
}
