// sopguard-core/src/application/mod.rs

pub mod dispatcher;
pub mod runner;

// --- RE-EXPORTS (FACADE PATTERN) ---
// Le CLI peut faire `use sopguard_core::application::{run_checklist, Dispatcher};`
pub use dispatcher::Dispatcher;
pub use runner::run_checklist;
