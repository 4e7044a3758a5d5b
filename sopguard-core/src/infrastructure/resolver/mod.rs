// sopguard-core/src/infrastructure/resolver/mod.rs

pub mod llm;
pub mod plan;

pub use llm::LlmResolver;
pub use plan::{PlanEntry, PlanResolver};
