//! SQL parsing and classification logic.
//!
//! Uses sqlparser-rs with the SQLite dialect to parse submissions and
//! classify each statement.

use sqlparser::ast::{Query, Select, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, TokenWithLocation, Tokenizer};

use super::{ClassificationResult, SafetyLevel, StatementType};

/// SQL classifier that parses and classifies SQL submissions.
#[derive(Debug)]
pub struct SqlClassifier {
    dialect: SQLiteDialect,
}

impl Default for SqlClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlClassifier {
    /// Creates a new SQL classifier.
    pub fn new() -> Self {
        Self {
            dialect: SQLiteDialect {},
        }
    }

    /// Classifies a SQL string.
    ///
    /// SQL the parser cannot handle is reported as destructive and unknown,
    /// which makes the sandbox rebuild its fixture after the run. The engine
    /// itself still decides whether the SQL is valid.
    pub fn classify(&self, sql: &str) -> ClassificationResult {
        let statements = match Parser::parse_sql(&self.dialect, sql) {
            Ok(statements) => statements,
            Err(e) => {
                return ClassificationResult::with_warning(
                    SafetyLevel::Destructive,
                    StatementType::Unknown,
                    format!("Could not parse SQL: {e}"),
                )
            }
        };

        match statements.as_slice() {
            [] => ClassificationResult::new(SafetyLevel::Safe, StatementType::Select),
            [single] => {
                let (level, stmt_type) = classify_statement(single);
                ClassificationResult::new(level, stmt_type)
            }
            many => {
                // Multiple statements: report the most dangerous, but reset if
                // any of them escapes the transaction.
                let mut max_level = SafetyLevel::Safe;
                let mut max_stmt_type = StatementType::Select;
                let mut requires_reset = false;

                for stmt in many {
                    let (level, stmt_type) = classify_statement(stmt);
                    requires_reset |= stmt_type.escapes_transaction();
                    if level.priority() > max_level.priority() {
                        max_level = level;
                        max_stmt_type = stmt_type;
                    }
                }

                let result = ClassificationResult::new(
                    max_level,
                    StatementType::Multiple(Box::new(max_stmt_type)),
                );
                if requires_reset {
                    result.force_reset()
                } else {
                    result
                }
            }
        }
    }

    /// Returns the source text of the last statement in `sql`, exactly as
    /// written. Used to describe an empty final result set, where SQLite
    /// names unaliased columns after their source text.
    pub fn last_statement(&self, sql: &str) -> Option<String> {
        let tokens = Tokenizer::new(&self.dialect, sql)
            .tokenize_with_location()
            .ok()?;

        // A semicolon starts a new statement only if real tokens follow it.
        let mut start = None;
        let mut pending = None;
        for TokenWithLocation { token, location } in &tokens {
            match token {
                Token::SemiColon => pending = Some(*location),
                Token::Whitespace(_) | Token::EOF => {}
                _ => {
                    if let Some(semicolon) = pending.take() {
                        start = Some(semicolon);
                    }
                }
            }
        }

        let begin = match start {
            Some(location) => byte_offset(sql, location.line, location.column)? + 1,
            None => 0,
        };
        // A trailing semicolon ends the statement; comments after it are dropped.
        let end = match pending {
            Some(location) => byte_offset(sql, location.line, location.column)?,
            None => sql.len(),
        };

        let statement = sql.get(begin..end)?.trim().trim_end_matches(';').trim_end();
        if statement.is_empty() {
            None
        } else {
            Some(statement.to_string())
        }
    }
}

/// Converts a tokenizer location (1-based line and character column) into a
/// byte offset into `sql`.
fn byte_offset(sql: &str, line: u64, column: u64) -> Option<usize> {
    let (mut current_line, mut current_column) = (1u64, 1u64);
    for (offset, ch) in sql.char_indices() {
        if current_line == line && current_column == column {
            return Some(offset);
        }
        if ch == '\n' {
            current_line += 1;
            current_column = 1;
        } else {
            current_column += 1;
        }
    }
    None
}

/// Convenience function to classify SQL without creating a classifier instance.
pub fn classify_sql(sql: &str) -> ClassificationResult {
    SqlClassifier::new().classify(sql)
}

/// Picks the more dangerous of two classifications.
fn most_dangerous(
    a: (SafetyLevel, StatementType),
    b: (SafetyLevel, StatementType),
) -> (SafetyLevel, StatementType) {
    if b.0.priority() > a.0.priority() {
        b
    } else {
        a
    }
}

/// Classifies a single parsed statement.
fn classify_statement(statement: &Statement) -> (SafetyLevel, StatementType) {
    match statement {
        // Query: may contain data-modifying CTEs, so recurse
        Statement::Query(query) => classify_query(query),
        Statement::Explain {
            analyze, statement, ..
        } => {
            if *analyze {
                let (inner_level, _) = classify_statement(statement);
                (inner_level, StatementType::Explain)
            } else {
                (SafetyLevel::Safe, StatementType::Explain)
            }
        }

        // Connection state: harmless to data inside the sandbox, but a
        // COMMIT would defeat the rollback.
        Statement::StartTransaction { .. }
        | Statement::Commit { .. }
        | Statement::Rollback { .. }
        | Statement::Savepoint { .. }
        | Statement::ReleaseSavepoint { .. } => (SafetyLevel::Safe, StatementType::Transaction),
        Statement::AttachDatabase { .. } => (SafetyLevel::Safe, StatementType::Attach),
        Statement::Pragma { .. } => (SafetyLevel::Safe, StatementType::Pragma),

        // Mutating: data modification
        Statement::Insert(_) => (SafetyLevel::Mutating, StatementType::Insert),
        Statement::Update { .. } => (SafetyLevel::Mutating, StatementType::Update),

        // Destructive: data loss or schema changes
        Statement::Delete(_) => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::Drop { .. } => (SafetyLevel::Destructive, StatementType::Drop),
        Statement::Truncate { .. } => (SafetyLevel::Destructive, StatementType::Delete),
        Statement::AlterTable { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::AlterIndex { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::AlterView { .. } => (SafetyLevel::Destructive, StatementType::Alter),
        Statement::CreateTable { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::CreateIndex { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::CreateView { .. } => (SafetyLevel::Destructive, StatementType::Create),
        Statement::CreateVirtualTable { .. } => (SafetyLevel::Destructive, StatementType::Create),

        _ => (SafetyLevel::Destructive, StatementType::Unknown),
    }
}

/// Classifies a Query by recursively inspecting for data-modifying operations.
fn classify_query(query: &Query) -> (SafetyLevel, StatementType) {
    let mut max = (SafetyLevel::Safe, StatementType::Select);

    if let Some(with) = &query.with {
        for cte in &with.cte_tables {
            max = most_dangerous(max, classify_query(&cte.query));
        }
    }

    most_dangerous(max, classify_set_expr(&query.body))
}

/// Classifies a SetExpr, detecting mutations and recursing into nested queries.
fn classify_set_expr(set_expr: &SetExpr) -> (SafetyLevel, StatementType) {
    match set_expr {
        SetExpr::Delete(stmt) => classify_statement(stmt),
        SetExpr::Update(stmt) => classify_statement(stmt),
        SetExpr::Insert(stmt) => classify_statement(stmt),
        SetExpr::Merge(stmt) => classify_statement(stmt),
        SetExpr::Query(query) => classify_query(query),
        SetExpr::Select(select) => classify_select(select),
        SetExpr::SetOperation { left, right, .. } => {
            most_dangerous(classify_set_expr(left), classify_set_expr(right))
        }
        SetExpr::Values(_) | SetExpr::Table(_) => (SafetyLevel::Safe, StatementType::Select),
    }
}

/// Classifies a Select by checking its FROM clause for subqueries.
fn classify_select(select: &Select) -> (SafetyLevel, StatementType) {
    select.from.iter().fold(
        (SafetyLevel::Safe, StatementType::Select),
        |max, twj| most_dangerous(max, classify_table_with_joins(twj)),
    )
}

/// Classifies a TableWithJoins, checking the main relation and all joins.
fn classify_table_with_joins(twj: &TableWithJoins) -> (SafetyLevel, StatementType) {
    twj.joins.iter().fold(
        classify_table_factor(&twj.relation),
        |max, join| most_dangerous(max, classify_table_factor(&join.relation)),
    )
}

/// Classifies a TableFactor, recursing into derived tables (subqueries).
fn classify_table_factor(factor: &TableFactor) -> (SafetyLevel, StatementType) {
    match factor {
        TableFactor::Derived { subquery, .. } => classify_query(subquery),
        TableFactor::NestedJoin {
            table_with_joins, ..
        } => classify_table_with_joins(table_with_joins),
        _ => (SafetyLevel::Safe, StatementType::Select),
    }
}
