//! Query verification.
//!
//! Runs learner SQL through a [`QueryExecutor`] and judges the result
//! against an expectation. Engine failures come back as [`ExecutionError`];
//! logical mismatches come back as a failing [`Verdict`].

mod compare;

pub use compare::{cells_match, compare, compare_with, FailReason, RowOrder, Verdict, FLOAT_TOLERANCE};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::db::{ExecutionOutcome, QueryExecutor, QueryResult};
use crate::error::{ExecutionError, ExecutionErrorKind};
use crate::safety::classify_sql;
use crate::scenario::{Level, Scenario};

/// Statement name reported when the engine, not the classifier, caught a write.
const UNCLASSIFIED_WRITE: &str = "a statement that writes";

/// Verifies submissions against expected results.
pub struct Verifier<'a> {
    executor: &'a dyn QueryExecutor,
    cancel: CancellationToken,
}

impl<'a> Verifier<'a> {
    pub fn new(executor: &'a dyn QueryExecutor) -> Self {
        Self {
            executor,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses `cancel` to abandon in-flight runs.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs `sql` and compares its result positionally with `expected`.
    pub async fn verify(
        &self,
        sql: &str,
        expected: &QueryResult,
    ) -> Result<Verdict, ExecutionError> {
        let outcome = self.executor.execute(sql, &self.cancel).await?;
        Ok(compare(&outcome.result, expected))
    }

    /// Runs `sql` against a level, applying its row-order policy and
    /// read-only guard.
    ///
    /// On a read-only level, SQL the classifier recognizes as a write is
    /// rejected without being run; anything else runs with writes refused by
    /// the executor, so unparseable batches cannot slip a write through.
    pub async fn verify_level(&self, sql: &str, level: &Level) -> Result<Verdict, ExecutionError> {
        if !level.read_only {
            let outcome = self.executor.execute(sql, &self.cancel).await?;
            return Ok(self.judge(level, &outcome));
        }

        let classification = classify_sql(sql);
        if classification.contains_mutation() {
            let statement = classification.statement_type.base().to_string();
            debug!(
                "Level '{}' is read-only, rejecting {} submission",
                level.level_id, statement
            );
            return Ok(Verdict::fail(FailReason::MutatingStatement { statement }));
        }

        match self.executor.execute_read_only(sql, &self.cancel).await {
            Ok(outcome) => Ok(self.judge(level, &outcome)),
            Err(e) if e.kind == ExecutionErrorKind::ReadOnly => {
                debug!(
                    "Level '{}' is read-only, the engine refused a write: {}",
                    level.level_id, e.message
                );
                Ok(Verdict::fail(FailReason::MutatingStatement {
                    statement: UNCLASSIFIED_WRITE.to_string(),
                }))
            }
            Err(e) => Err(e),
        }
    }

    fn judge(&self, level: &Level, outcome: &ExecutionOutcome) -> Verdict {
        let verdict = compare_with(&outcome.result, &level.expected_result, level.row_order);
        debug!(
            "Level '{}' verdict after {:?}: {}",
            level.level_id, outcome.execution_time, verdict
        );
        verdict
    }

    /// Runs every level's reference query and reports the outcome per level.
    pub async fn audit(&self, scenario: &Scenario) -> AuditReport {
        let mut entries = Vec::with_capacity(scenario.levels.len());

        for level in &scenario.levels {
            let outcome = self.verify_level(&level.correct_query, level).await;
            match &outcome {
                Ok(Verdict::Pass) => {}
                Ok(verdict) => warn!("Audit: level '{}' failed: {}", level.level_id, verdict),
                Err(e) => warn!("Audit: level '{}' errored: {}", level.level_id, e),
            }
            entries.push(AuditEntry {
                level_id: level.level_id.clone(),
                outcome,
            });
        }

        AuditReport {
            scenario_id: scenario.id.clone(),
            entries,
        }
    }
}

/// Audit outcome for one level.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub level_id: String,
    pub outcome: Result<Verdict, ExecutionError>,
}

impl AuditEntry {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Ok(Verdict::Pass))
    }
}

/// Audit results for a whole scenario.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub scenario_id: String,
    pub entries: Vec<AuditEntry>,
}

impl AuditReport {
    /// Returns true if every reference query reproduced its expected result.
    pub fn all_passed(&self) -> bool {
        self.entries.iter().all(AuditEntry::passed)
    }

    /// Returns the entries that did not pass.
    pub fn failures(&self) -> impl Iterator<Item = &AuditEntry> {
        self.entries.iter().filter(|e| !e.passed())
    }
}
