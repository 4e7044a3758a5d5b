// sopguard-core/src/infrastructure/error.rs

use miette::Diagnostic;
use thiserror::Error;

use crate::domain::error::DomainError;

#[derive(Error, Debug, Diagnostic)]
pub enum InfrastructureError {
    // --- FILESYSTEM (IO) ---
    #[error("File System Error: {0}")]
    #[diagnostic(
        code(sopguard::infra::io),
        help("Check file permissions or path validity.")
    )]
    Io(#[from] std::io::Error),

    #[error("Input file not found: '{0}'")]
    #[diagnostic(code(sopguard::infra::not_found))]
    FileNotFound(String),

    // --- TABULAR FILES ---
    #[error("CSV Error in '{path}': {source}")]
    #[diagnostic(
        code(sopguard::infra::csv),
        help("Check the delimiter and that every row has as many cells as the header.")
    )]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid table in '{path}': {source}")]
    #[diagnostic(code(sopguard::infra::table))]
    InvalidTable {
        path: String,
        #[source]
        source: DomainError,
    },

    #[error("Unsupported file format '{0}'")]
    #[diagnostic(
        code(sopguard::infra::unsupported_format),
        help("Use a CSV/TSV file or an Excel workbook (.xlsx, .xls, .ods). Reports can also be written as .json.")
    )]
    UnsupportedFormat(String),

    // --- WORKBOOKS ---
    #[error("Cannot read workbook '{path}': {source}")]
    #[diagnostic(code(sopguard::infra::workbook))]
    Workbook {
        path: String,
        #[source]
        source: calamine::Error,
    },

    #[error("Sheet '{sheet}' not found in '{path}' (available: {available})")]
    #[diagnostic(
        code(sopguard::infra::sheet_not_found),
        help("Sheet names are case-sensitive.")
    )]
    SheetNotFound {
        path: String,
        sheet: String,
        available: String,
    },

    #[error("Workbook '{0}' has no sheet")]
    #[diagnostic(code(sopguard::infra::empty_workbook))]
    EmptyWorkbook(String),

    #[error("Excel Export Error: {0}")]
    #[diagnostic(code(sopguard::infra::xlsx))]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    // --- CONFIG / YAML / JSON ---
    #[error("YAML Parsing Error: {0}")]
    #[diagnostic(
        code(sopguard::infra::yaml),
        help("Check your YAML syntax (indentation, types).")
    )]
    YamlError(#[from] serde_yaml::Error),

    #[error("JSON Error: {0}")]
    #[diagnostic(code(sopguard::infra::json))]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    #[diagnostic(code(sopguard::infra::config))]
    ConfigError(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(sopguard::infra::config_invalid))]
    InvalidConfig(#[from] validator::ValidationErrors),

    #[error("Intent plan error in '{path}': {source}")]
    #[diagnostic(code(sopguard::infra::plan))]
    Plan {
        path: String,
        #[source]
        source: DomainError,
    },
}
