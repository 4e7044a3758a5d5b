// sopguard/src/commands/mod.rs

pub mod route;
pub mod run;
pub mod tools;

use anyhow::Context;
use std::path::Path;
use tracing::warn;

use sopguard_core::infrastructure::config::SopGuardConfig;
use sopguard_core::infrastructure::resolver::{LlmResolver, PlanResolver};
use sopguard_core::ports::IntentResolver;

/// Picks the resolver: an explicit plan file wins, then the LLM endpoint from
/// the configuration. Without either, every rule resolves as unrouted.
pub fn build_resolver(
    plan: Option<&Path>,
    config: &SopGuardConfig,
) -> anyhow::Result<Box<dyn IntentResolver>> {
    if let Some(path) = plan {
        let plan = PlanResolver::from_file(path)
            .with_context(|| format!("Failed to load intent plan from {:?}", path))?;
        return Ok(Box::new(plan));
    }

    if config.resolver.is_configured() {
        let llm = LlmResolver::new(&config.resolver).context("Failed to initialize LLM resolver")?;
        tracing::info!(url = llm.url(), model = %config.resolver.model, "🤖 LLM routing active");
        return Ok(Box::new(llm));
    }

    warn!(
        "⚠️ LLM routing inactive (set LLMFOUNDRY_TOKEN/OPENAI_API_KEY and base_url/OPENAI_BASE_URL, or pass --plan): every rule will be unrouted"
    );
    Ok(Box::new(PlanResolver::empty()))
}
