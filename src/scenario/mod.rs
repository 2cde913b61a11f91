//! Scenario content.
//!
//! A scenario is a fixture (schema plus seed rows) and an ordered list of
//! levels. The `black-pearl` scenario ships inside the binary; others are
//! loaded from a directory holding `scenario.json`, `schema.sql` and
//! `seed.sql`.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::db::QueryResult;
use crate::error::{QuestError, Result};
use crate::verify::RowOrder;

/// Id of the scenario compiled into the binary.
pub const DEFAULT_SCENARIO: &str = "black-pearl";

const MANIFEST_FILE: &str = "scenario.json";
const SCHEMA_FILE: &str = "schema.sql";
const SEED_FILE: &str = "seed.sql";

const BLACK_PEARL_MANIFEST: &str = include_str!("../../scenarios/black-pearl/scenario.json");
const BLACK_PEARL_SCHEMA: &str = include_str!("../../scenarios/black-pearl/schema.sql");
const BLACK_PEARL_SEED: &str = include_str!("../../scenarios/black-pearl/seed.sql");

/// One SQL exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    /// Progress key, unique within the scenario.
    pub level_id: String,
    pub title: String,
    pub story_text: String,
    pub task: String,
    pub hint: String,

    /// Reference query. Only run by the audit, never at verification time.
    pub correct_query: String,

    pub expected_result: QueryResult,
    pub success_message: String,

    #[serde(default)]
    pub row_order: RowOrder,

    /// Reject submissions that write data or schema.
    #[serde(default = "default_read_only")]
    pub read_only: bool,
}

fn default_read_only() -> bool {
    true
}

/// On-disk shape of `scenario.json`.
#[derive(Debug, Deserialize)]
struct Manifest {
    id: String,
    title: String,
    levels: Vec<Level>,
}

/// A fixture plus its levels.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub id: String,
    pub title: String,
    pub schema_sql: String,
    pub seed_sql: String,
    pub levels: Vec<Level>,
}

impl Scenario {
    /// Returns the scenario compiled into the binary.
    pub fn black_pearl() -> Result<Self> {
        Self::from_parts(BLACK_PEARL_MANIFEST, BLACK_PEARL_SCHEMA, BLACK_PEARL_SEED)
    }

    /// Looks up a built-in scenario by id.
    pub fn builtin(id: &str) -> Result<Self> {
        match id {
            DEFAULT_SCENARIO => Self::black_pearl(),
            other => Err(QuestError::content(format!(
                "Unknown scenario '{other}'. Built-in scenarios: {DEFAULT_SCENARIO}"
            ))),
        }
    }

    /// Builds and validates a scenario from its manifest JSON and fixture SQL.
    pub fn from_parts(manifest_json: &str, schema_sql: &str, seed_sql: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(manifest_json)
            .map_err(|e| QuestError::content(format!("Invalid scenario manifest: {e}")))?;

        let scenario = Self {
            id: manifest.id,
            title: manifest.title,
            schema_sql: schema_sql.to_string(),
            seed_sql: seed_sql.to_string(),
            levels: manifest.levels,
        };
        scenario.validate()?;

        debug!(
            "Loaded scenario '{}' with {} levels",
            scenario.id,
            scenario.levels.len()
        );
        Ok(scenario)
    }

    /// Loads a scenario directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        let read = |name: &str| {
            let path = dir.join(name);
            std::fs::read_to_string(&path).map_err(|e| {
                QuestError::content(format!("Failed to read {}: {e}", path.display()))
            })
        };

        Self::from_parts(&read(MANIFEST_FILE)?, &read(SCHEMA_FILE)?, &read(SEED_FILE)?)
    }

    /// Checks ids and the shape of every expected result.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_scenario_id(&self.id) {
            return Err(QuestError::content(format!(
                "Invalid scenario id '{}': use letters, digits and '-'",
                self.id
            )));
        }

        if self.levels.is_empty() {
            return Err(QuestError::content(format!(
                "Scenario '{}' has no levels",
                self.id
            )));
        }

        let mut seen = HashSet::new();
        for level in &self.levels {
            if level.level_id.trim().is_empty() {
                return Err(QuestError::content(format!(
                    "Scenario '{}' has a level with an empty id",
                    self.id
                )));
            }
            if !seen.insert(level.level_id.as_str()) {
                return Err(QuestError::content(format!(
                    "Scenario '{}' has duplicate level id '{}'",
                    self.id, level.level_id
                )));
            }
            level.expected_result.check_shape().map_err(|e| {
                QuestError::content(format!(
                    "Scenario '{}', level '{}': expected result {e}",
                    self.id, level.level_id
                ))
            })?;
        }

        Ok(())
    }

    /// Returns the level with the given id.
    pub fn level(&self, level_id: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.level_id == level_id)
    }

    /// Returns the SQL that builds the fixture database.
    pub fn fixture_sql(&self) -> String {
        format!("{}\n{}", self.schema_sql, self.seed_sql)
    }
}

/// Scenario ids double as progress keys and directory names.
fn is_valid_scenario_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}
