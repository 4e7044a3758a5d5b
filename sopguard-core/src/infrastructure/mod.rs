// sopguard-core/src/infrastructure/mod.rs

pub mod config;
pub mod error;
pub mod fs;
pub mod resolver;
pub mod tabular;

pub use tabular::{export_report, load_checklist, load_table};
