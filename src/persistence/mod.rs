//! Persistence layer for sql-quest.
//!
//! Records which levels a learner has completed in a local SQLite file. The
//! verifier never writes here; callers record a completion after a `Pass`.

mod migrations;

use crate::error::{QuestError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_RETRY_ATTEMPTS: u32 = 3;
const RETRY_DELAY_MS: u64 = 100;

/// Completed-level store backed by a SQLite file.
pub struct ProgressStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl ProgressStore {
    /// Opens or creates the progress database at the default platform path.
    ///
    /// - Linux: `~/.local/share/sql-quest/progress.db`
    /// - macOS: `~/Library/Application Support/sql-quest/progress.db`
    /// - Windows: `%APPDATA%\sql-quest\progress.db`
    pub async fn open_default() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open(&path).await
    }

    /// Opens or creates the progress database at the specified path.
    pub async fn open(path: &Path) -> Result<Self> {
        Self::ensure_parent_dirs(path)?;

        match Self::try_open(path).await {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!("Failed to open progress database: {e}. Attempting recovery...");
                Self::attempt_recovery(path).await
            }
        }
    }

    /// Returns the default progress database path for the current platform.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| QuestError::persistence("Could not determine data directory"))?;
        Ok(data_dir.join("sql-quest").join("progress.db"))
    }

    /// Attempts to open the database with retries for lock contention.
    async fn try_open(path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * 2u64.pow(attempt)))
                    .await;
            }

            match Self::connect(path).await {
                Ok(pool) => {
                    migrations::run_migrations(&pool).await?;
                    info!("Progress database opened at {}", path.display());
                    return Ok(Self {
                        pool,
                        db_path: path.to_path_buf(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| QuestError::persistence("Failed to open database after retries")))
    }

    async fn connect(path: &Path) -> Result<SqlitePool> {
        let conn_str = format!("sqlite:{}?mode=rwc", path.display());
        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| QuestError::persistence(format!("Invalid database path: {e}")))?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .create_if_missing(true);

        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(|e| {
                QuestError::persistence(format!("Failed to connect to progress database: {e}"))
            })
    }

    fn ensure_parent_dirs(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                QuestError::persistence(format!(
                    "Failed to create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        Ok(())
    }

    /// Moves a corrupted database aside and starts a fresh one.
    async fn attempt_recovery(path: &Path) -> Result<Self> {
        let backup_path = path.with_extension("db.bak");

        if path.exists() {
            std::fs::rename(path, &backup_path).map_err(|e| {
                QuestError::persistence(format!(
                    "Failed to backup corrupted database to {}: {e}",
                    backup_path.display()
                ))
            })?;
            warn!("Backed up corrupted database to {}", backup_path.display());
        }

        Self::try_open(path).await.map_err(|e| {
            QuestError::persistence(format!("Failed to recreate database after backup: {e}"))
        })
    }

    /// Records a completed level. Returns true if it was not already recorded.
    pub async fn record_completion(&self, scenario_id: &str, level_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO progress (scenario_id, level_id) VALUES (?, ?)",
        )
        .bind(scenario_id)
        .bind(level_id)
        .execute(&self.pool)
        .await
        .map_err(|e| QuestError::persistence(format!("Failed to record completion: {e}")))?;

        let newly_completed = result.rows_affected() > 0;
        if newly_completed {
            info!("Completed {scenario_id}/{level_id}");
        } else {
            debug!("{scenario_id}/{level_id} was already completed");
        }
        Ok(newly_completed)
    }

    /// Returns `"scenario/level"` keys in the order they were completed.
    pub async fn completed_levels(&self) -> Result<Vec<String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT scenario_id, level_id FROM progress ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| QuestError::persistence(format!("Failed to list progress: {e}")))?;

        Ok(rows
            .into_iter()
            .map(|(scenario, level)| format!("{scenario}/{level}"))
            .collect())
    }

    /// Returns true if the level has been completed.
    pub async fn is_completed(&self, scenario_id: &str, level_id: &str) -> Result<bool> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT 1 FROM progress WHERE scenario_id = ? AND level_id = ?")
                .bind(scenario_id)
                .bind(level_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| QuestError::persistence(format!("Failed to read progress: {e}")))?;

        Ok(row.is_some())
    }

    /// Returns the path to the progress database.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Closes the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
