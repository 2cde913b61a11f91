//! Error types for sql-quest.
//!
//! `QuestError` covers infrastructure and content problems. Failures caused by
//! the learner's SQL are reported through [`ExecutionError`] instead, so the
//! two vocabularies never mix.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Main error type for sql-quest operations.
#[derive(Error, Debug)]
pub enum QuestError {
    /// Configuration errors (invalid config file, bad paths, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Scenario content errors (malformed expected results, duplicate levels, etc.)
    #[error("Content error: {0}")]
    Content(String),

    /// Progress database errors.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Sandbox construction errors (fixture failed to load, engine unavailable).
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// Internal application errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuestError {
    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a content error with the given message.
    pub fn content(msg: impl Into<String>) -> Self {
        Self::Content(msg.into())
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a sandbox error with the given message.
    pub fn sandbox(msg: impl Into<String>) -> Self {
        Self::Sandbox(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "Configuration Error",
            Self::Content(_) => "Content Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Sandbox(_) => "Sandbox Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using QuestError.
pub type Result<T> = std::result::Result<T, QuestError>;

/// Classification of a failed query run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionErrorKind {
    /// The SQL could not be parsed by the engine.
    Syntax,
    /// Unknown table, column or function, or an ambiguous column reference.
    Reference,
    /// Constraint violation or any other runtime failure inside the engine.
    Constraint,
    /// The query exceeded the wall-clock limit and was interrupted.
    Timeout,
    /// The caller abandoned the run.
    Cancelled,
    /// A read-only run tried to write data or schema.
    ReadOnly,
    /// The sandbox itself failed; not caused by the submitted SQL.
    Sandbox,
}

impl fmt::Display for ExecutionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax => write!(f, "Syntax error"),
            Self::Reference => write!(f, "Reference error"),
            Self::Constraint => write!(f, "Constraint error"),
            Self::Timeout => write!(f, "Timeout"),
            Self::ReadOnly => write!(f, "Read-only violation"),
            Self::Cancelled => write!(f, "Cancelled"),
            Self::Sandbox => write!(f, "Sandbox error"),
        }
    }
}

/// A failure raised while running learner SQL.
///
/// `message` carries the engine's text verbatim.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct ExecutionError {
    pub kind: ExecutionErrorKind,
    pub message: String,
}

impl ExecutionError {
    pub fn new(kind: ExecutionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Creates a timeout error for a run interrupted after `limit_ms`.
    pub fn timeout(limit_ms: u128) -> Self {
        Self::new(
            ExecutionErrorKind::Timeout,
            format!("Query timed out after {limit_ms} ms"),
        )
    }

    /// Creates the error for a write attempted during a read-only run.
    pub fn read_only() -> Self {
        Self::new(
            ExecutionErrorKind::ReadOnly,
            "attempt to write a readonly database",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ExecutionErrorKind::Cancelled, "Query was cancelled")
    }

    pub fn sandbox(message: impl Into<String>) -> Self {
        Self::new(ExecutionErrorKind::Sandbox, message)
    }

    /// Classifies a raw SQLite error message.
    pub fn from_engine_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = classify_engine_message(&message);
        Self { kind, message }
    }

    /// Returns true if the learner can fix this by editing the query.
    pub fn is_user_correctable(&self) -> bool {
        !matches!(self.kind, ExecutionErrorKind::Sandbox)
    }
}

/// Maps SQLite's error text to an execution error kind.
fn classify_engine_message(message: &str) -> ExecutionErrorKind {
    let lower = message.to_lowercase();

    if lower.contains("syntax error")
        || lower.contains("incomplete input")
        || lower.contains("unrecognized token")
    {
        return ExecutionErrorKind::Syntax;
    }

    if lower.contains("no such table")
        || lower.contains("no such column")
        || lower.contains("no such function")
        || lower.contains("ambiguous column name")
    {
        return ExecutionErrorKind::Reference;
    }

    if lower.contains("readonly database") {
        return ExecutionErrorKind::ReadOnly;
    }

    if lower.contains("interrupted") {
        return ExecutionErrorKind::Timeout;
    }

    ExecutionErrorKind::Constraint
}
