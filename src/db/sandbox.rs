//! SQLite sandbox executor.
//!
//! Owns one in-memory SQLite connection seeded from a scenario fixture. Every
//! run executes inside `BEGIN ... ROLLBACK`; when a submission could escape
//! that transaction the fixture is rebuilt from scratch, so every attempt sees
//! identical data. Read-only runs also switch on `PRAGMA query_only` and
//! compare the connection's write counters before and after.

use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow};
use sqlx::{Column, ConnectOptions, Either, Executor, Row as SqlxRow, TypeInfo, ValueRef};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{Cell, ExecutionOutcome, QueryExecutor, QueryResult, Row};
use crate::error::{ExecutionError, QuestError, Result};
use crate::safety::SqlClassifier;

/// Default wall-clock limit for a single submission.
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Default number of SQLite VM instructions between deadline checks.
pub const DEFAULT_PROGRESS_INTERVAL: i32 = 1000;

/// Extra time the outer tokio timeout allows beyond the engine deadline.
const HARD_TIMEOUT_GRACE: Duration = Duration::from_millis(500);

const NOT_INTERRUPTED: u8 = 0;
const INTERRUPTED_TIMEOUT: u8 = 1;
const INTERRUPTED_CANCEL: u8 = 2;

/// Sandbox limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxConfig {
    /// Wall-clock limit per run.
    pub timeout: Duration,

    /// VM instructions between deadline and cancellation checks.
    pub progress_interval: i32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// In-memory SQLite database seeded with a fixture, isolated per run.
pub struct SqliteSandbox {
    fixture_sql: String,
    config: SandboxConfig,
    conn: Mutex<SqliteConnection>,
    classifier: SqlClassifier,
}

impl SqliteSandbox {
    /// Creates a sandbox and loads the fixture (schema and seed rows).
    pub async fn new(fixture_sql: impl Into<String>, config: SandboxConfig) -> Result<Self> {
        let fixture_sql = fixture_sql.into();
        let conn = open_fixture(&fixture_sql).await?;
        info!("Sandbox fixture loaded ({} bytes of SQL)", fixture_sql.len());

        Ok(Self {
            fixture_sql,
            config,
            conn: Mutex::new(conn),
            classifier: SqlClassifier::new(),
        })
    }

    /// Returns the sandbox limits.
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Discards the current database and reloads the fixture.
    pub async fn reset(&self) -> Result<()> {
        let mut conn = self.conn.lock().await;
        self.rebuild(&mut conn).await
    }

    async fn rebuild(&self, conn: &mut SqliteConnection) -> Result<()> {
        let fresh = open_fixture(&self.fixture_sql).await?;
        // The old worker thread exits once any interrupted statement unwinds.
        drop(std::mem::replace(conn, fresh));
        Ok(())
    }

    /// Opens the per-run transaction, rebuilding once if the connection is unusable.
    async fn begin(&self, conn: &mut SqliteConnection) -> std::result::Result<(), ExecutionError> {
        if (&mut *conn).execute("BEGIN").await.is_ok() {
            return Ok(());
        }

        warn!("Sandbox connection could not open a transaction, rebuilding fixture");
        self.rebuild(conn)
            .await
            .map_err(|e| ExecutionError::sandbox(e.to_string()))?;

        (&mut *conn)
            .execute("BEGIN")
            .await
            .map(|_| ())
            .map_err(|e| ExecutionError::sandbox(format!("Failed to open transaction: {e}")))
    }

    /// Installs a progress handler that interrupts the running statement once
    /// the deadline passes or `cancel` fires.
    async fn arm_interrupt(
        &self,
        conn: &mut SqliteConnection,
        cancel: CancellationToken,
        flag: Arc<AtomicU8>,
    ) -> std::result::Result<(), ExecutionError> {
        let deadline = Instant::now() + self.config.timeout;
        let mut handle = conn
            .lock_handle()
            .await
            .map_err(|e| ExecutionError::sandbox(format!("Failed to lock sandbox handle: {e}")))?;

        handle.set_progress_handler(self.config.progress_interval, move || {
            if cancel.is_cancelled() {
                flag.store(INTERRUPTED_CANCEL, Ordering::SeqCst);
                return false;
            }
            if Instant::now() >= deadline {
                flag.store(INTERRUPTED_TIMEOUT, Ordering::SeqCst);
                return false;
            }
            true
        });

        Ok(())
    }

    /// Refuses writes for the rest of the run and records the write counters.
    async fn enter_read_only(
        &self,
        conn: &mut SqliteConnection,
    ) -> std::result::Result<WriteMarks, ExecutionError> {
        (&mut *conn)
            .execute("PRAGMA query_only = ON")
            .await
            .map_err(|e| ExecutionError::sandbox(format!("Failed to enter read-only mode: {e}")))?;

        WriteMarks::read(conn)
            .await
            .map_err(|e| ExecutionError::sandbox(format!("Failed to read write counters: {e}")))
    }

    /// Removes the progress handler, rolls back the run and leaves read-only
    /// mode.
    ///
    /// Returns false if any step failed, meaning the submission ended the
    /// transaction itself and the fixture can no longer be trusted.
    async fn finish(&self, conn: &mut SqliteConnection, read_only: bool) -> bool {
        if let Ok(mut handle) = conn.lock_handle().await {
            handle.remove_progress_handler();
        }

        let rolled_back = match (&mut *conn).execute("ROLLBACK").await {
            Ok(_) => true,
            Err(e) => {
                debug!("Rollback failed: {e}");
                false
            }
        };

        if !read_only {
            return rolled_back;
        }

        match (&mut *conn).execute("PRAGMA query_only = OFF").await {
            Ok(_) => rolled_back,
            Err(e) => {
                debug!("Leaving read-only mode failed: {e}");
                false
            }
        }
    }

    fn map_engine_error(&self, error: sqlx::Error, flag: &AtomicU8) -> ExecutionError {
        match flag.load(Ordering::SeqCst) {
            INTERRUPTED_TIMEOUT => return ExecutionError::timeout(self.config.timeout.as_millis()),
            INTERRUPTED_CANCEL => return ExecutionError::cancelled(),
            _ => {}
        }

        match error.as_database_error() {
            Some(db_error) => ExecutionError::from_engine_message(db_error.message()),
            None => ExecutionError::sandbox(error.to_string()),
        }
    }
}

impl SqliteSandbox {
    /// Runs `sql` inside the per-run transaction, refusing writes when
    /// `read_only` is set.
    async fn run_isolated(
        &self,
        sql: &str,
        cancel: &CancellationToken,
        read_only: bool,
    ) -> std::result::Result<ExecutionOutcome, ExecutionError> {
        let classification = self.classifier.classify(sql);
        if let Some(warning) = &classification.warning {
            debug!("{warning}");
        }

        if cancel.is_cancelled() {
            return Err(ExecutionError::cancelled());
        }

        let mut conn = self.conn.lock().await;
        self.begin(&mut conn).await?;

        let marks = if read_only {
            match self.enter_read_only(&mut conn).await {
                Ok(marks) => Some(marks),
                Err(e) => {
                    if !self.finish(&mut conn, true).await {
                        let _ = self.rebuild(&mut conn).await;
                    }
                    return Err(e);
                }
            }
        } else {
            None
        };

        let flag = Arc::new(AtomicU8::new(NOT_INTERRUPTED));
        if let Err(e) = self.arm_interrupt(&mut conn, cancel.clone(), flag.clone()).await {
            self.finish(&mut conn, read_only).await;
            return Err(e);
        }

        let start = Instant::now();
        let run = tokio::time::timeout(
            self.config.timeout + HARD_TIMEOUT_GRACE,
            capture_last_result(&mut conn, sql, &self.classifier),
        )
        .await;
        let execution_time = start.elapsed();

        let mut needs_reset = classification.requires_reset;
        let mut result = match run {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(self.map_engine_error(e, &flag)),
            Err(_) => {
                warn!("Query exceeded hard timeout of {:?}", self.config.timeout);
                needs_reset = true;
                Err(ExecutionError::timeout(self.config.timeout.as_millis()))
            }
        };

        // query_only can be switched off by the submission itself.
        if let Some(before) = marks.filter(|_| result.is_ok()) {
            match WriteMarks::read(&mut conn).await {
                Ok(after) if after == before => {}
                Ok(_) => {
                    warn!("Read-only run changed the database, rebuilding fixture");
                    needs_reset = true;
                    result = Err(ExecutionError::read_only());
                }
                Err(e) => {
                    needs_reset = true;
                    result = Err(self.map_engine_error(e, &flag));
                }
            }
        }

        if !needs_reset && !self.finish(&mut conn, read_only).await {
            needs_reset = true;
        }

        if needs_reset {
            warn!(
                "Submission ({}) may have escaped the sandbox transaction, rebuilding fixture",
                classification.statement_type
            );
            self.rebuild(&mut conn)
                .await
                .map_err(|e| ExecutionError::sandbox(e.to_string()))?;
        }

        debug!(
            "Sandbox run finished in {:?} ({})",
            execution_time,
            match &result {
                Ok(r) => format!("{} rows", r.row_count()),
                Err(e) => e.to_string(),
            }
        );

        result.map(|result| ExecutionOutcome {
            result,
            execution_time,
            classification,
        })
    }
}

#[async_trait]
impl QueryExecutor for SqliteSandbox {
    async fn execute(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<ExecutionOutcome, ExecutionError> {
        self.run_isolated(sql, cancel, false).await
    }

    async fn execute_read_only(
        &self,
        sql: &str,
        cancel: &CancellationToken,
    ) -> std::result::Result<ExecutionOutcome, ExecutionError> {
        self.run_isolated(sql, cancel, true).await
    }
}

/// Counters that move whenever the connection writes data or schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct WriteMarks {
    total_changes: i64,
    schema_version: i64,
}

impl WriteMarks {
    async fn read(conn: &mut SqliteConnection) -> std::result::Result<Self, sqlx::Error> {
        let row = (&mut *conn)
            .fetch_one("SELECT total_changes(), (SELECT schema_version FROM pragma_schema_version)")
            .await?;

        Ok(Self {
            total_changes: row.try_get(0)?,
            schema_version: row.try_get(1)?,
        })
    }
}

/// Opens a fresh in-memory database and runs the fixture SQL.
async fn open_fixture(fixture_sql: &str) -> Result<SqliteConnection> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| QuestError::sandbox(format!("Invalid sandbox options: {e}")))?
        .foreign_keys(true);

    let mut conn = options
        .connect()
        .await
        .map_err(|e| QuestError::sandbox(format!("Failed to open in-memory database: {e}")))?;

    (&mut conn)
        .execute(fixture_sql)
        .await
        .map_err(|e| QuestError::sandbox(format!("Failed to load fixture: {e}")))?;

    Ok(conn)
}

/// Runs every statement in `sql` and keeps the last statement's rows.
async fn capture_last_result(
    conn: &mut SqliteConnection,
    sql: &str,
    classifier: &SqlClassifier,
) -> std::result::Result<QueryResult, sqlx::Error> {
    let mut current = QueryResult::new();
    let mut last: Option<QueryResult> = None;

    {
        let mut stream = sqlx::raw_sql(sql).fetch_many(&mut *conn);
        while let Some(step) = stream.try_next().await? {
            match step {
                // End of one statement.
                Either::Left(_) => last = Some(std::mem::take(&mut current)),
                Either::Right(row) => {
                    if current.columns.is_empty() {
                        current.columns = column_names(&row);
                    }
                    current.values.push(convert_row(&row));
                }
            }
        }
    }

    let mut result = if current.values.is_empty() {
        last.unwrap_or_default()
    } else {
        current
    };

    // No rows means no column metadata; describe the final statement instead.
    if result.columns.is_empty() && result.values.is_empty() {
        if let Some(statement) = classifier.last_statement(sql) {
            if let Ok(described) = (&mut *conn).describe(statement.as_str()).await {
                result.columns = described
                    .columns()
                    .iter()
                    .map(|col| col.name().to_string())
                    .collect();
            }
        }
    }

    Ok(result)
}

fn column_names(row: &SqliteRow) -> Vec<String> {
    row.columns()
        .iter()
        .map(|col| col.name().to_string())
        .collect()
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow) -> Row {
    (0..row.len()).map(|i| convert_cell(row, i)).collect()
}

/// Converts a single value using its storage class, not the declared type.
fn convert_cell(row: &SqliteRow, index: usize) -> Cell {
    let storage = match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => raw.type_info().name().to_uppercase(),
        _ => return Cell::Null,
    };

    match storage.as_str() {
        "INTEGER" | "BIGINT" | "BOOLEAN" => row
            .try_get_unchecked::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(|v| Cell::Number(v as f64))
            .unwrap_or(Cell::Null),

        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Cell::Number)
            .unwrap_or(Cell::Null),

        "BLOB" => row
            .try_get_unchecked::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(|bytes| Cell::Text(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Cell::Null),

        _ => row
            .try_get_unchecked::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Cell::Text)
            .unwrap_or(Cell::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionErrorKind;
    use pretty_assertions::assert_eq;

    const FIXTURE: &str = r#"
        CREATE TABLE pirates (id INTEGER PRIMARY KEY, name TEXT UNIQUE NOT NULL, status TEXT);
        CREATE TABLE ships (
            id INTEGER PRIMARY KEY,
            ship_name TEXT NOT NULL,
            captain_id INTEGER REFERENCES pirates(id)
        );
        INSERT INTO pirates VALUES (1, 'Captain Jax', 'active'), (2, 'Barbarossa', 'undead');
        INSERT INTO ships VALUES (101, 'The Black Pearl', 1), (104, 'Queen Anne''s Revenge', 2);
    "#;

    const RUNAWAY_QUERY: &str =
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT COUNT(*) FROM c";

    async fn sandbox() -> SqliteSandbox {
        SqliteSandbox::new(FIXTURE, SandboxConfig::default())
            .await
            .unwrap()
    }

    async fn sandbox_with_timeout(ms: u64) -> SqliteSandbox {
        let config = SandboxConfig {
            timeout: Duration::from_millis(ms),
            ..SandboxConfig::default()
        };
        SqliteSandbox::new(FIXTURE, config).await.unwrap()
    }

    #[tokio::test]
    async fn test_select_returns_columns_and_rows() {
        let sandbox = sandbox().await;
        let result = sandbox
            .run("SELECT id, name FROM pirates ORDER BY id")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["id", "name"]);
        assert_eq!(
            result.values,
            vec![
                vec![Cell::Number(1.0), Cell::from("Captain Jax")],
                vec![Cell::Number(2.0), Cell::from("Barbarossa")],
            ]
        );
    }

    #[tokio::test]
    async fn test_cell_storage_classes() {
        let sandbox = sandbox().await;
        let result = sandbox
            .run("SELECT NULL AS missing, 1.5 AS share, 'x' AS label, 7 AS num")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["missing", "share", "label", "num"]);
        assert_eq!(
            result.values,
            vec![vec![
                Cell::Null,
                Cell::Number(1.5),
                Cell::from("x"),
                Cell::Number(7.0)
            ]]
        );
    }

    #[tokio::test]
    async fn test_batch_returns_last_statement_only() {
        let sandbox = sandbox().await;
        let result = sandbox
            .run("SELECT name FROM pirates; SELECT ship_name FROM ships WHERE id = 104;")
            .await
            .unwrap();

        assert_eq!(result.columns, vec!["ship_name"]);
        assert_eq!(result.values, vec![vec![Cell::from("Queen Anne's Revenge")]]);
    }

    #[tokio::test]
    async fn test_empty_result_keeps_column_names() {
        let sandbox = sandbox().await;
        let result = sandbox
            .run("SELECT ship_name, captain_id FROM ships WHERE id = 0")
            .await
            .unwrap();

        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["ship_name", "captain_id"]);
    }

    #[tokio::test]
    async fn test_empty_result_keeps_source_column_text() {
        let sandbox = sandbox().await;
        let hit = sandbox
            .run("SELECT name||'!' FROM pirates WHERE id = 1")
            .await
            .unwrap();
        let miss = sandbox
            .run("SELECT name||'!' FROM pirates WHERE id = -1")
            .await
            .unwrap();

        assert!(miss.is_empty());
        assert_eq!(hit.columns, vec!["name||'!'"]);
        assert_eq!(miss.columns, hit.columns);
    }

    #[tokio::test]
    async fn test_syntax_error_is_classified() {
        let sandbox = sandbox().await;
        let err = sandbox.run("SELEC name FROM pirates").await.unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Syntax);
        assert!(err.message.contains("syntax error"), "{}", err.message);
    }

    #[tokio::test]
    async fn test_reference_error_keeps_engine_message() {
        let sandbox = sandbox().await;
        let err = sandbox.run("SELECT name FROM pirate").await.unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Reference);
        assert_eq!(err.message, "no such table: pirate");

        let err = sandbox.run("SELECT shipname FROM ships").await.unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Reference);
    }

    #[tokio::test]
    async fn test_constraint_error_is_classified() {
        let sandbox = sandbox().await;
        let err = sandbox
            .run("INSERT INTO pirates (id, name) VALUES (3, 'Captain Jax')")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Constraint);
        assert!(err.message.contains("UNIQUE constraint failed"));
    }

    #[tokio::test]
    async fn test_delete_does_not_persist() {
        let sandbox = sandbox().await;
        sandbox.run("DELETE FROM ships; DELETE FROM pirates;").await.unwrap();

        let result = sandbox.run("SELECT COUNT(*) AS n FROM pirates").await.unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_drop_does_not_persist() {
        let sandbox = sandbox().await;
        sandbox.run("DROP TABLE ships").await.unwrap();

        let result = sandbox.run("SELECT COUNT(*) FROM ships").await.unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_commit_inside_submission_does_not_persist() {
        let sandbox = sandbox().await;
        let _ = sandbox.run("DELETE FROM ships; COMMIT;").await;

        let result = sandbox.run("SELECT COUNT(*) FROM ships").await.unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_rollback_then_delete_does_not_persist() {
        let sandbox = sandbox().await;
        let _ = sandbox.run("ROLLBACK; DELETE FROM ships;").await;

        let result = sandbox.run("SELECT COUNT(*) FROM ships").await.unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_runaway_query_times_out() {
        let sandbox = sandbox_with_timeout(200).await;
        assert_eq!(sandbox.config().timeout, Duration::from_millis(200));
        let start = Instant::now();
        let err = sandbox.run(RUNAWAY_QUERY).await.unwrap_err();

        assert_eq!(err.kind, ExecutionErrorKind::Timeout);
        assert!(start.elapsed() < Duration::from_secs(5));

        // The sandbox stays usable afterwards.
        let result = sandbox.run("SELECT COUNT(*) FROM pirates").await.unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_query() {
        let sandbox = sandbox_with_timeout(10_000).await;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = sandbox.execute(RUNAWAY_QUERY, &cancel).await.unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_precancelled_token_short_circuits() {
        let sandbox = sandbox().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = sandbox.execute("SELECT 1", &cancel).await.unwrap_err();
        assert_eq!(err.kind, ExecutionErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_execute_reports_classification() {
        let sandbox = sandbox().await;
        let outcome = sandbox
            .execute("UPDATE pirates SET status = 'pardoned'", &CancellationToken::new())
            .await
            .unwrap();
        assert!(outcome.classification.contains_mutation());
        assert!(outcome.result.columns.is_empty());
    }

    async fn ship_count(sandbox: &SqliteSandbox) -> Vec<Row> {
        sandbox
            .run("SELECT COUNT(*) FROM ships")
            .await
            .unwrap()
            .values
    }

    #[tokio::test]
    async fn test_read_only_run_refuses_unparseable_write_batch() {
        let sandbox = sandbox().await;
        let err = sandbox
            .execute_read_only(
                "DELETE FROM ships; SELECT name FROM pirates WHERE name GLOB 'B*';",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ExecutionErrorKind::ReadOnly);
        assert_eq!(ship_count(&sandbox).await, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_read_only_run_refuses_schema_changes() {
        let sandbox = sandbox().await;
        let err = sandbox
            .execute_read_only(
                "CREATE TRIGGER sink AFTER INSERT ON ships BEGIN DELETE FROM pirates; END; SELECT 1;",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ExecutionErrorKind::ReadOnly);
    }

    #[tokio::test]
    async fn test_read_only_run_catches_query_only_being_switched_off() {
        let sandbox = sandbox().await;
        let err = sandbox
            .execute_read_only(
                "PRAGMA query_only = OFF; DELETE FROM ships; PRAGMA query_only = ON; SELECT 1;",
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind, ExecutionErrorKind::ReadOnly);
        assert_eq!(ship_count(&sandbox).await, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_read_only_run_leaves_writes_enabled_afterwards() {
        let sandbox = sandbox().await;
        let outcome = sandbox
            .execute_read_only("SELECT name FROM pirates ORDER BY id", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.result.row_count(), 2);

        let result = sandbox
            .run("UPDATE pirates SET status = 'pardoned'; SELECT COUNT(*) FROM pirates WHERE status = 'pardoned';")
            .await
            .unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    fn assert_send<T: Send>(_: &T) {}

    #[tokio::test]
    async fn test_sandbox_runs_on_spawned_tasks() {
        let sandbox = Arc::new(sandbox().await);
        assert_send(&sandbox.reset());

        let worker = Arc::clone(&sandbox);
        let result = tokio::spawn(async move { worker.run("SELECT COUNT(*) FROM ships").await })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_reset_restores_fixture() {
        let sandbox = sandbox().await;
        sandbox.reset().await.unwrap();
        let result = sandbox.run("SELECT COUNT(*) FROM ships").await.unwrap();
        assert_eq!(result.values, vec![vec![Cell::Number(2.0)]]);
    }

    #[tokio::test]
    async fn test_bad_fixture_fails_fast() {
        let result = SqliteSandbox::new("CREATE TABLE (", SandboxConfig::default()).await;
        assert!(matches!(result, Err(QuestError::Sandbox(_))));
    }
}
