// sopguard-core/src/domain/error.rs

use miette::Diagnostic;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum DomainError {
    #[error("Duplicate column '{0}' in table header")]
    #[diagnostic(
        code(sopguard::domain::duplicate_column),
        help("Column names must be unique within one table.")
    )]
    DuplicateColumn(String),

    #[error("Row {row} has {found} cells but the header declares {expected} columns")]
    #[diagnostic(code(sopguard::domain::ragged_row))]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Checklist must contain a column '{0}'")]
    #[diagnostic(
        code(sopguard::domain::checklist),
        help("Add a 'checks' column holding one SOP rule per row.")
    )]
    MissingChecksColumn(String),

    #[error("Invalid intent plan: {0}")]
    #[diagnostic(code(sopguard::domain::plan))]
    InvalidPlan(String),
}

/// Structural failures raised by a validation operation.
///
/// A failing check is never a `ToolError`: it is a normal `passed = false`
/// result. These only cover input the operation cannot evaluate at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Column '{0}' not found")]
    ColumnNotFound(String),

    #[error("Invalid expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
