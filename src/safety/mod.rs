//! Statement classification.
//!
//! Parses submitted SQL and classifies it as read-only, mutating or
//! destructive. The sandbox uses this to decide whether a rollback is enough
//! to restore the fixture, and the verifier uses it to reject mutating
//! submissions on read-only levels.

mod parser;

pub use parser::{classify_sql, SqlClassifier};

use serde::Serialize;
use std::fmt;

/// Safety level classification for SQL statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    /// Read-only statements (SELECT, EXPLAIN, transaction control).
    Safe,
    /// Data modification (INSERT, UPDATE, REPLACE).
    Mutating,
    /// Data loss or schema changes (DELETE, DROP, ALTER, CREATE).
    Destructive,
}

impl SafetyLevel {
    /// Returns true if statements at this level change data or schema.
    pub fn is_mutating(&self) -> bool {
        matches!(self, Self::Mutating | Self::Destructive)
    }

    /// Returns a priority value (higher = more dangerous).
    fn priority(&self) -> u8 {
        match self {
            Self::Safe => 0,
            Self::Mutating => 1,
            Self::Destructive => 2,
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Safe => write!(f, "Safe"),
            Self::Mutating => write!(f, "Mutating"),
            Self::Destructive => write!(f, "Destructive"),
        }
    }
}

/// The type of SQL statement detected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StatementType {
    Select,
    Insert,
    Update,
    Delete,
    Drop,
    Alter,
    Create,
    Explain,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT, RELEASE.
    Transaction,
    /// ATTACH or DETACH.
    Attach,
    Pragma,
    /// Multiple statements detected; contains the most dangerous type.
    Multiple(Box<StatementType>),
    /// Statement type could not be determined.
    Unknown,
}

impl StatementType {
    /// Returns the innermost statement type, unwrapping `Multiple`.
    pub fn base(&self) -> &StatementType {
        match self {
            Self::Multiple(inner) => inner.base(),
            other => other,
        }
    }

    /// Returns true if this statement can escape a rollback or change
    /// connection state (transaction control, ATTACH, PRAGMA, unparsed SQL).
    pub fn escapes_transaction(&self) -> bool {
        matches!(
            self.base(),
            Self::Transaction | Self::Attach | Self::Pragma | Self::Unknown
        )
    }
}

impl fmt::Display for StatementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Select => write!(f, "SELECT"),
            Self::Insert => write!(f, "INSERT"),
            Self::Update => write!(f, "UPDATE"),
            Self::Delete => write!(f, "DELETE"),
            Self::Drop => write!(f, "DROP"),
            Self::Alter => write!(f, "ALTER"),
            Self::Create => write!(f, "CREATE"),
            Self::Explain => write!(f, "EXPLAIN"),
            Self::Transaction => write!(f, "transaction control"),
            Self::Attach => write!(f, "ATTACH"),
            Self::Pragma => write!(f, "PRAGMA"),
            Self::Multiple(inner) => write!(f, "Multiple ({})", inner),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Result of classifying a SQL submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassificationResult {
    /// The most dangerous safety level found.
    pub level: SafetyLevel,
    /// The type of statement(s) detected.
    pub statement_type: StatementType,
    /// True if the sandbox must rebuild the fixture after running this SQL.
    pub requires_reset: bool,
    /// Optional note for logs.
    pub warning: Option<String>,
}

impl ClassificationResult {
    /// Creates a new classification result.
    pub fn new(level: SafetyLevel, statement_type: StatementType) -> Self {
        let requires_reset = statement_type.escapes_transaction();
        Self {
            level,
            statement_type,
            requires_reset,
            warning: None,
        }
    }

    /// Creates a classification result with a warning message.
    pub fn with_warning(
        level: SafetyLevel,
        statement_type: StatementType,
        warning: impl Into<String>,
    ) -> Self {
        Self {
            warning: Some(warning.into()),
            ..Self::new(level, statement_type)
        }
    }

    /// Marks the result as requiring a fixture rebuild.
    pub fn force_reset(mut self) -> Self {
        self.requires_reset = true;
        self
    }

    /// Returns true if the submission positively contains a statement that
    /// writes data or schema. Unparseable SQL is not counted.
    pub fn contains_mutation(&self) -> bool {
        self.level.is_mutating() && *self.statement_type.base() != StatementType::Unknown
    }
}
