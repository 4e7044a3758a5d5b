pub mod catalog;
pub mod checklist;
pub mod coercion;
pub mod error;
pub mod report;
pub mod table;

// Re-exports pratiques pour simplifier les imports ailleurs
pub use checklist::{Checklist, Rule};
pub use error::{DomainError, ToolError};
pub use report::{ValidationRecord, ValidationReport};
pub use table::{Table, TableBundle, Value};
