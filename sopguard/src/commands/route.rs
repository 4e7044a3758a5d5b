// sopguard/src/commands/route.rs
//
// USE CASE: Resolve one rule sentence and validate the answer against the
// catalog, without touching any data.

use anyhow::Context;
use serde_json::{Value as JsonValue, json};
use std::path::PathBuf;

use sopguard_core::domain::catalog::{Operation, describe_catalog};
use sopguard_core::infrastructure::config::load_config;
use sopguard_core::ports::Resolution;

use crate::commands::build_resolver;

pub async fn execute(check: String, project_dir: PathBuf, plan: Option<PathBuf>) -> anyhow::Result<()> {
    let config = load_config(&project_dir)
        .with_context(|| format!("Failed to load configuration from {:?}", project_dir))?;
    let resolver = build_resolver(plan.as_deref(), &config)?;

    let resolution = resolver.resolve(&check, &describe_catalog()).await;
    println!("{}", serde_json::to_string_pretty(&describe(&check, resolution))?);
    Ok(())
}

fn describe(
    check: &str,
    resolution: Result<Resolution, sopguard_core::ports::ResolverError>,
) -> JsonValue {
    match resolution {
        Ok(Resolution::Resolved(intent)) => {
            let mut out = json!({
                "check": check,
                "tool": intent.tool,
                "args": intent.args,
            });
            match Operation::from_intent(&intent) {
                Ok(_) => out["valid"] = JsonValue::Bool(true),
                Err(e) => {
                    out["valid"] = JsonValue::Bool(false);
                    out["error"] = JsonValue::String(e.to_string());
                }
            }
            out
        }
        Ok(Resolution::Unresolved) => json!({
            "check": check,
            "tool": null,
            "valid": false,
            "error": "unable to route",
        }),
        Err(e) => json!({
            "check": check,
            "tool": null,
            "valid": false,
            "error": "unable to route",
            "reason": e.to_string(),
        }),
    }
}
