//! Result comparison.
//!
//! Decides whether a learner's result set matches a level's expected result
//! and, when it does not, explains the first difference in learner-facing
//! terms.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::{Cell, QueryResult, Row};

/// Relative tolerance for numeric cell equality.
pub const FLOAT_TOLERANCE: f64 = 1e-9;

/// How rows are matched against the expected result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowOrder {
    /// Row i of the actual result must match row i of the expected result.
    #[default]
    Ordered,
    /// Rows may appear in any order; each expected row needs a distinct match.
    Unordered,
}

/// Why a submission did not match.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailReason {
    ColumnCountMismatch {
        expected: usize,
        actual: usize,
    },
    /// `position` is zero-based.
    ColumnNameMismatch {
        position: usize,
        expected: String,
        actual: String,
    },
    RowCountMismatch {
        expected: usize,
        actual: usize,
    },
    /// `row` is zero-based; `column` is the expected column name.
    CellMismatch {
        row: usize,
        column: String,
        expected: Cell,
        actual: Cell,
    },
    /// An expected row with no matching actual row (unordered levels only).
    UnmatchedRow { row: usize, expected: Row },
    /// A read-only level received a statement that writes data or schema.
    MutatingStatement { statement: String },
}

impl FailReason {
    /// Returns the learner-facing hint for this mismatch.
    pub fn hint(&self) -> String {
        match self {
            Self::ColumnCountMismatch { expected, actual } => format!(
                "Your query returned {} {}, expected {}. Check the columns in your SELECT list.",
                actual,
                plural(*actual, "column", "columns"),
                expected
            ),
            Self::ColumnNameMismatch {
                position,
                expected,
                actual,
            } => format!(
                "Column {} should be '{}' but yours is '{}'. Check the column order, or rename it with AS.",
                position + 1,
                expected,
                actual
            ),
            Self::RowCountMismatch { expected, actual } => {
                if *actual == 0 {
                    format!(
                        "Your query returned no rows, expected {}. Check your WHERE conditions and JOINs.",
                        expected
                    )
                } else if actual > expected {
                    format!(
                        "Your query returned {} {}, expected {}. Check your filter conditions or add a LIMIT.",
                        actual,
                        plural(*actual, "row", "rows"),
                        expected
                    )
                } else {
                    format!(
                        "Your query returned {} {}, expected {}. Your filter may be too strict.",
                        actual,
                        plural(*actual, "row", "rows"),
                        expected
                    )
                }
            }
            Self::CellMismatch {
                row,
                column,
                expected,
                actual,
            } => format!(
                "Row {}, column '{}': expected {} but got {}.",
                row + 1,
                column,
                expected,
                actual
            ),
            Self::UnmatchedRow { row, expected } => format!(
                "Expected row {} ({}) is missing from your result.",
                row + 1,
                expected
                    .iter()
                    .map(Cell::to_display_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            Self::MutatingStatement { statement } => format!(
                "This level only needs to read data, but your query runs {}. Nothing was changed; try a SELECT instead.",
                statement
            ),
        }
    }
}

fn plural<'a>(n: usize, one: &'a str, many: &'a str) -> &'a str {
    if n == 1 {
        one
    } else {
        many
    }
}

/// Outcome of comparing a result against its expectation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    Fail { reason: FailReason, detail: String },
}

impl Verdict {
    /// Builds a failing verdict whose detail is the reason's hint.
    pub fn fail(reason: FailReason) -> Self {
        let detail = reason.hint();
        Self::Fail { reason, detail }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn reason(&self) -> Option<&FailReason> {
        match self {
            Self::Pass => None,
            Self::Fail { reason, .. } => Some(reason),
        }
    }

    /// Returns the learner-facing hint, if the verdict is a failure.
    pub fn detail(&self) -> Option<&str> {
        match self {
            Self::Pass => None,
            Self::Fail { detail, .. } => Some(detail),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "Pass"),
            Self::Fail { detail, .. } => write!(f, "Fail: {detail}"),
        }
    }
}

/// Compares with positional row matching.
pub fn compare(actual: &QueryResult, expected: &QueryResult) -> Verdict {
    compare_with(actual, expected, RowOrder::Ordered)
}

/// Compares under the given row-order policy, stopping at the first difference.
pub fn compare_with(actual: &QueryResult, expected: &QueryResult, order: RowOrder) -> Verdict {
    if actual.columns.len() != expected.columns.len() {
        return Verdict::fail(FailReason::ColumnCountMismatch {
            expected: expected.columns.len(),
            actual: actual.columns.len(),
        });
    }

    if let Some((position, (a, e))) = actual
        .columns
        .iter()
        .zip(&expected.columns)
        .enumerate()
        .find(|(_, (a, e))| !a.trim().eq_ignore_ascii_case(e.trim()))
    {
        return Verdict::fail(FailReason::ColumnNameMismatch {
            position,
            expected: e.clone(),
            actual: a.clone(),
        });
    }

    if actual.row_count() != expected.row_count() {
        return Verdict::fail(FailReason::RowCountMismatch {
            expected: expected.row_count(),
            actual: actual.row_count(),
        });
    }

    match order {
        RowOrder::Ordered => compare_positional(actual, expected),
        RowOrder::Unordered => compare_unordered(actual, expected),
    }
}

fn compare_positional(actual: &QueryResult, expected: &QueryResult) -> Verdict {
    for (row, (actual_row, expected_row)) in actual.values.iter().zip(&expected.values).enumerate() {
        for (col, expected_cell) in expected_row.iter().enumerate() {
            let actual_cell = actual_row.get(col).unwrap_or(&Cell::Null);
            if !cells_match(actual_cell, expected_cell) {
                return Verdict::fail(FailReason::CellMismatch {
                    row,
                    column: expected.columns.get(col).cloned().unwrap_or_default(),
                    expected: expected_cell.clone(),
                    actual: actual_cell.clone(),
                });
            }
        }
    }
    Verdict::Pass
}

/// Greedy multiset matching: each expected row claims the first unused
/// actual row equal to it.
fn compare_unordered(actual: &QueryResult, expected: &QueryResult) -> Verdict {
    let mut used = vec![false; actual.values.len()];

    for (row, expected_row) in expected.values.iter().enumerate() {
        let found = actual
            .values
            .iter()
            .enumerate()
            .position(|(i, candidate)| !used[i] && rows_match(candidate, expected_row));

        match found {
            Some(i) => used[i] = true,
            None => {
                return Verdict::fail(FailReason::UnmatchedRow {
                    row,
                    expected: expected_row.clone(),
                })
            }
        }
    }
    Verdict::Pass
}

fn rows_match(actual: &[Cell], expected: &[Cell]) -> bool {
    actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(a, e)| cells_match(a, e))
}

/// Type-tolerant cell equality.
///
/// Numbers compare by value, text compares after trimming (case matters), a
/// numeric string equals the number it spells, and NULL equals only NULL.
pub fn cells_match(actual: &Cell, expected: &Cell) -> bool {
    match (actual, expected) {
        (Cell::Null, Cell::Null) => true,
        (Cell::Null, _) | (_, Cell::Null) => false,
        (Cell::Number(a), Cell::Number(b)) => numbers_match(*a, *b),
        (Cell::Text(a), Cell::Text(b)) => a.trim() == b.trim(),
        (Cell::Number(n), Cell::Text(t)) | (Cell::Text(t), Cell::Number(n)) => t
            .trim()
            .parse::<f64>()
            .map(|v| numbers_match(*n, v))
            .unwrap_or(false),
    }
}

fn numbers_match(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    // Scale clamped to 1.0 so values near zero still compare sensibly.
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() / scale < FLOAT_TOLERANCE
}
