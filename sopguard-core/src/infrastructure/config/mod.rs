pub mod project;

pub use project::{ResolverConfig, SopGuardConfig, load_config, load_config_with_env};
