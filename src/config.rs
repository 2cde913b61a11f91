//! Configuration management for sql-quest.
//!
//! Handles loading configuration from a TOML file and environment variables:
//! sandbox limits, the progress database location, and extra scenario
//! directories.

use crate::db::SandboxConfig;
use crate::error::{QuestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Overrides `[sandbox] timeout_ms`.
pub const ENV_TIMEOUT_MS: &str = "SQL_QUEST_TIMEOUT_MS";

/// Overrides `[progress] path`.
pub const ENV_PROGRESS_DB: &str = "SQL_QUEST_PROGRESS_DB";

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub sandbox: SandboxSettings,

    #[serde(default)]
    pub progress: ProgressSettings,

    /// Extra scenario directories keyed by scenario id.
    #[serde(default)]
    pub scenarios: HashMap<String, PathBuf>,
}

/// `[sandbox]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxSettings {
    /// Wall-clock limit per query, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// SQLite VM instructions between deadline checks.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: i32,
}

fn default_timeout_ms() -> u64 {
    crate::db::DEFAULT_TIMEOUT_MS
}

fn default_progress_interval() -> i32 {
    crate::db::DEFAULT_PROGRESS_INTERVAL
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            progress_interval: default_progress_interval(),
        }
    }
}

impl SandboxSettings {
    /// Converts to the sandbox's runtime limits.
    pub fn to_sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            progress_interval: self.progress_interval,
        }
    }
}

/// `[progress]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProgressSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Progress database file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: None,
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sql-quest")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file. A missing file yields defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| QuestError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| {
            QuestError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects limits the sandbox cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.sandbox.timeout_ms == 0 {
            return Err(QuestError::config("[sandbox] timeout_ms must be greater than 0"));
        }
        if self.sandbox.progress_interval <= 0 {
            return Err(QuestError::config(
                "[sandbox] progress_interval must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Applies `SQL_QUEST_*` environment variables on top of file values.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(
            std::env::var(ENV_TIMEOUT_MS).ok(),
            std::env::var(ENV_PROGRESS_DB).ok(),
        )
    }

    fn apply_overrides(
        &mut self,
        timeout_ms: Option<String>,
        progress_db: Option<String>,
    ) -> Result<()> {
        if let Some(raw) = timeout_ms {
            self.sandbox.timeout_ms = raw.trim().parse().map_err(|_| {
                QuestError::config(format!("{ENV_TIMEOUT_MS} must be a number, got '{raw}'"))
            })?;
        }
        if let Some(path) = progress_db {
            self.progress.path = Some(PathBuf::from(path));
        }
        self.validate()
    }

    /// Returns the directory registered for a scenario id, if any.
    pub fn scenario_dir(&self, id: &str) -> Option<&Path> {
        self.scenarios.get(id).map(PathBuf::as_path)
    }
}
