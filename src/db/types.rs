//! Query result types for sql-quest.
//!
//! Defines the tabular shape that flows between the sandbox, the comparator
//! and level content.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::safety::ClassificationResult;

/// The result of a query: ordered column names and rows of cells.
///
/// This is also the shape of a level's expected result, so it serializes to
/// `{"columns": [...], "values": [[...], ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in the order the engine produced them.
    pub columns: Vec<String>,

    /// Rows of data.
    pub values: Vec<Row>,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data<C, S>(columns: C, values: Vec<Row>) -> Self
    where
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            values,
        }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the result set has no rows.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Checks that every row has exactly one cell per column.
    ///
    /// Returns the index and width of the first offending row.
    pub fn check_shape(&self) -> std::result::Result<(), ShapeError> {
        let width = self.columns.len();
        match self
            .values
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != width)
        {
            Some((row, cells)) => Err(ShapeError {
                row,
                cells: cells.len(),
                columns: width,
            }),
            None => Ok(()),
        }
    }
}

/// A row whose width disagrees with the column list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeError {
    pub row: usize,
    pub cells: usize,
    pub columns: usize,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "row {} has {} cells but there are {} columns",
            self.row + 1,
            self.cells,
            self.columns
        )
    }
}

/// A row of data from a query result.
pub type Row = Vec<Cell>;

/// A single scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// NULL value.
    #[default]
    Null,

    /// Any numeric value, integer or floating point.
    Number(f64),

    /// Text value, including timestamps stored as text.
    Text(String),
}

impl Cell {
    /// Returns the value formatted for display to the learner.
    ///
    /// Whole numbers print without a fractional part, text is quoted.
    pub fn to_display_string(&self) -> String {
        match self {
            Cell::Null => "NULL".to_string(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(s) => format!("'{s}'"),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl From<i32> for Cell {
    fn from(v: i32) -> Self {
        Cell::Number(v as f64)
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Number(v as f64)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Number(v)
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl<T> From<Option<T>> for Cell
where
    T: Into<Cell>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Cell::Null,
        }
    }
}

/// A successful sandbox run.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Result set of the last statement.
    pub result: QueryResult,

    /// Wall-clock time spent inside the engine.
    pub execution_time: Duration,

    /// What kind of statements the submission contained.
    pub classification: ClassificationResult,
}
