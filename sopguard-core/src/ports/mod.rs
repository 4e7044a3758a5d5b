pub mod resolver;

pub use resolver::{IntentResolver, Resolution, ResolverError};
