//! Learner session.
//!
//! A session owns one scenario, the sandbox seeded with its fixture, and an
//! optional progress store. Callers pass it around explicitly; there is no
//! process-wide state.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::db::{QueryExecutor, QueryResult, SandboxConfig, SqliteSandbox};
use crate::error::{ExecutionError, QuestError, Result};
use crate::persistence::ProgressStore;
use crate::scenario::{Level, Scenario};
use crate::verify::{AuditReport, Verdict, Verifier};

/// The outcome of submitting SQL for a level.
#[derive(Debug, Clone)]
pub struct Submission {
    pub level_id: String,

    /// Verdict for a query that ran, or the engine's error.
    pub outcome: std::result::Result<Verdict, ExecutionError>,

    /// True only the first time this level is passed.
    pub newly_completed: bool,
}

impl Submission {
    pub fn passed(&self) -> bool {
        matches!(self.outcome, Ok(Verdict::Pass))
    }
}

/// A scenario being played.
pub struct Session {
    scenario: Scenario,
    sandbox: SqliteSandbox,
    progress: Option<ProgressStore>,
    cancel: CancellationToken,
}

impl Session {
    /// Builds the sandbox for `scenario` and attaches an optional progress store.
    pub async fn open(
        scenario: Scenario,
        config: SandboxConfig,
        progress: Option<ProgressStore>,
    ) -> Result<Self> {
        let sandbox = SqliteSandbox::new(scenario.fixture_sql(), config).await?;
        info!(
            "Session opened for scenario '{}' ({} levels)",
            scenario.id,
            scenario.levels.len()
        );

        Ok(Self {
            scenario,
            sandbox,
            progress,
            cancel: CancellationToken::new(),
        })
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn progress(&self) -> Option<&ProgressStore> {
        self.progress.as_ref()
    }

    /// Token that interrupts the query in flight when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    fn verifier(&self) -> Verifier<'_> {
        Verifier::new(&self.sandbox).with_cancellation(self.cancel.clone())
    }

    /// Runs SQL without judging it.
    pub async fn run(&self, sql: &str) -> std::result::Result<QueryResult, ExecutionError> {
        self.sandbox
            .execute(sql, &self.cancel)
            .await
            .map(|outcome| outcome.result)
    }

    /// Verifies `sql` for a level and records the completion on a pass.
    pub async fn submit(&self, level_id: &str, sql: &str) -> Result<Submission> {
        let level = self.level(level_id)?;
        let outcome = self.verifier().verify_level(sql, level).await;

        let mut newly_completed = false;
        if matches!(outcome, Ok(Verdict::Pass)) {
            if let Some(progress) = &self.progress {
                newly_completed = progress
                    .record_completion(&self.scenario.id, level_id)
                    .await?;
            }
        }

        debug!(
            "Submission for '{}': {}",
            level_id,
            match &outcome {
                Ok(verdict) => verdict.to_string(),
                Err(e) => e.to_string(),
            }
        );

        Ok(Submission {
            level_id: level_id.to_string(),
            outcome,
            newly_completed,
        })
    }

    /// Runs every level's reference query against the fixture.
    pub async fn audit(&self) -> AuditReport {
        self.verifier().audit(&self.scenario).await
    }

    /// Returns every level with its completion status.
    pub async fn level_statuses(&self) -> Result<Vec<(&Level, bool)>> {
        let mut statuses = Vec::with_capacity(self.scenario.levels.len());
        for level in &self.scenario.levels {
            let done = match &self.progress {
                Some(progress) => {
                    progress
                        .is_completed(&self.scenario.id, &level.level_id)
                        .await?
                }
                None => false,
            };
            statuses.push((level, done));
        }
        Ok(statuses)
    }

    /// Looks up a level, failing with a content error if it does not exist.
    pub fn level(&self, level_id: &str) -> Result<&Level> {
        self.scenario.level(level_id).ok_or_else(|| {
            QuestError::content(format!(
                "Scenario '{}' has no level '{}'",
                self.scenario.id, level_id
            ))
        })
    }

    /// Closes the progress store, if any.
    pub async fn close(self) {
        if let Some(progress) = &self.progress {
            progress.close().await;
        }
    }
}
