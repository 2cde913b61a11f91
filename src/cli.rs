//! Command-line argument parsing for sql-quest.
//!
//! Uses clap derive. The binary does one thing per invocation: list levels,
//! print the schema, audit a scenario, or verify a query for a level.

use crate::config::Config;
use crate::scenario::DEFAULT_SCENARIO;
use clap::Parser;
use std::io::Read;
use std::path::PathBuf;

/// Output format for results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// One JSON document on stdout.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {s}. Expected: text or json")),
        }
    }
}

/// What the invocation should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    List,
    Schema,
    Check,
    Submit { level_id: String, sql: String },
}

/// A sandboxed SQL puzzle game: solve levels by querying a pirate ledger.
#[derive(Parser, Debug)]
#[command(name = "sql-quest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Scenario to play
    #[arg(short = 's', long, env = "SQL_QUEST_SCENARIO", value_name = "ID", default_value = DEFAULT_SCENARIO)]
    pub scenario: String,

    /// Load the scenario from a directory (scenario.json, schema.sql, seed.sql)
    #[arg(long, value_name = "PATH")]
    pub scenario_dir: Option<PathBuf>,

    /// List levels with completion marks
    #[arg(long)]
    pub list: bool,

    /// Print the scenario's schema
    #[arg(long)]
    pub schema: bool,

    /// Run every level's reference query and report mismatches
    #[arg(long)]
    pub check: bool,

    /// Level to submit a query for
    #[arg(short = 'l', long, value_name = "LEVEL_ID")]
    pub level: Option<String>,

    /// SQL to submit
    #[arg(short = 'q', long, value_name = "SQL", conflicts_with = "file")]
    pub query: Option<String>,

    /// Read the SQL from a file (use "-" for stdin)
    #[arg(short = 'f', long, value_name = "PATH")]
    pub file: Option<String>,

    /// Output format: text or json
    #[arg(long, value_name = "FORMAT", default_value = "text")]
    pub output: String,

    /// Query time limit in milliseconds (overrides config)
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Do not read or record progress
    #[arg(long)]
    pub no_progress: bool,

    /// Config file path
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the config file path to use.
    ///
    /// Uses the --config argument if provided, otherwise the default path.
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }

    /// Parses the output format from the --output argument.
    pub fn parse_output_format(&self) -> std::result::Result<OutputFormat, String> {
        self.output.parse()
    }

    /// Applies flags that override configuration values.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ms) = self.timeout_ms {
            config.sandbox.timeout_ms = ms;
        }
        if self.no_progress {
            config.progress.enabled = false;
        }
    }

    /// Validates flag combinations.
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.parse_output_format()?;

        let modes = [self.list, self.schema, self.check, self.level.is_some()]
            .iter()
            .filter(|set| **set)
            .count();
        if modes > 1 {
            return Err("Use only one of --list, --schema, --check or --level".to_string());
        }

        let has_sql = self.query.is_some() || self.file.is_some();
        if self.level.is_some() && !has_sql {
            return Err("--level requires --query or --file".to_string());
        }
        if self.level.is_none() && has_sql {
            return Err("--query and --file require --level".to_string());
        }

        if self.timeout_ms == Some(0) {
            return Err("--timeout-ms must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Resolves the action, reading the submitted SQL if needed.
    ///
    /// With no action flags the level list is shown.
    pub fn action(&self) -> std::result::Result<Action, String> {
        self.validate()?;

        if self.schema {
            return Ok(Action::Schema);
        }
        if self.check {
            return Ok(Action::Check);
        }
        match &self.level {
            Some(level_id) => Ok(Action::Submit {
                level_id: level_id.clone(),
                sql: self.read_sql()?,
            }),
            None => Ok(Action::List),
        }
    }

    fn read_sql(&self) -> std::result::Result<String, String> {
        if let Some(sql) = &self.query {
            return Ok(sql.clone());
        }

        match self.file.as_deref() {
            Some("-") => {
                let mut sql = String::new();
                std::io::stdin()
                    .read_to_string(&mut sql)
                    .map_err(|e| format!("Failed to read SQL from stdin: {e}"))?;
                Ok(sql)
            }
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read SQL file '{path}': {e}")),
            None => Err("--level requires --query or --file".to_string()),
        }
    }
}
