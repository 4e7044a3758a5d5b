// sopguard-core/src/infrastructure/resolver/plan.rs

// Static routing table: each checklist sentence is mapped to its intent ahead
// of time in a YAML file. Used for offline runs and reproducible audits.
//
// intents:
//   - check: "Current stock must be positive"
//     tool: row_condition
//     args: { expr: "`Current Stock` > 0" }

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{info, instrument};

use crate::domain::catalog::{RawIntent, ToolDescriptor};
use crate::domain::error::DomainError;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::resolver::{IntentResolver, Resolution, ResolverError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    pub check: String,
    /// `None` marks a rule as deliberately unroutable.
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default)]
    pub args: JsonValue,
}

#[derive(Debug, Deserialize)]
struct PlanFile {
    #[serde(default)]
    intents: Vec<PlanEntry>,
}

#[derive(Debug, Clone, Default)]
pub struct PlanResolver {
    entries: Vec<PlanEntry>,
}

impl PlanResolver {
    /// A plan that routes nothing: every rule comes back unresolved.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(entries: Vec<PlanEntry>) -> Result<Self, DomainError> {
        let mut seen = HashSet::new();
        for entry in &entries {
            let check = entry.check.trim();
            if check.is_empty() {
                return Err(DomainError::InvalidPlan("entry with an empty 'check'".into()));
            }
            if !seen.insert(check) {
                return Err(DomainError::InvalidPlan(format!(
                    "check '{}' is listed more than once",
                    check
                )));
            }
        }
        Ok(Self { entries })
    }

    #[instrument]
    pub fn from_file(path: &Path) -> Result<Self, InfrastructureError> {
        let path_str = path.display().to_string();
        if !path.exists() {
            return Err(InfrastructureError::FileNotFound(path_str));
        }
        let content = fs::read_to_string(path)?;
        let file: PlanFile = serde_yaml::from_str(&content)?;
        let plan = Self::new(file.intents).map_err(|source| InfrastructureError::Plan {
            path: path_str,
            source,
        })?;
        info!(entries = plan.len(), "🗺️ Intent plan loaded");
        Ok(plan)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact match on the trimmed text first, then case-insensitive.
    pub fn lookup(&self, check: &str) -> Option<&PlanEntry> {
        let check = check.trim();
        self.entries
            .iter()
            .find(|e| e.check.trim() == check)
            .or_else(|| {
                let lowered = check.to_lowercase();
                self.entries
                    .iter()
                    .find(|e| e.check.trim().to_lowercase() == lowered)
            })
    }
}

#[async_trait]
impl IntentResolver for PlanResolver {
    async fn resolve(
        &self,
        check: &str,
        _catalog: &[ToolDescriptor],
    ) -> Result<Resolution, ResolverError> {
        let resolution = self
            .lookup(check)
            .and_then(|entry| {
                entry
                    .tool
                    .as_ref()
                    .map(|tool| RawIntent::new(tool.clone(), entry.args.clone()))
            })
            .map(Resolution::Resolved)
            .unwrap_or(Resolution::Unresolved);
        Ok(resolution)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    const PLAN: &str = r#"
intents:
  - check: "Current stock must be positive"
    tool: row_condition
    args:
      expr: "`Current Stock` > 0"
  - check: "Batch column must exist"
    tool: column_exists
    args: { column: Batch }
  - check: "Warehouse must be tidy"
"#;

    fn plan() -> PlanResolver {
        let dir = tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        fs::write(&path, PLAN).unwrap();
        PlanResolver::from_file(&path).unwrap()
    }

    #[tokio::test]
    async fn test_resolves_known_checks() -> Result<()> {
        let plan = plan();
        assert_eq!(plan.len(), 3);

        let res = plan.resolve("Current stock must be positive", &[]).await?;
        assert_eq!(
            res,
            Resolution::Resolved(RawIntent::new(
                "row_condition",
                json!({"expr": "`Current Stock` > 0"})
            ))
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_lookup_trims_and_ignores_case() -> Result<()> {
        let res = plan().resolve("  batch COLUMN must exist ", &[]).await?;
        assert!(matches!(res, Resolution::Resolved(ref i) if i.tool == "column_exists"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_or_toolless_checks_are_unresolved() -> Result<()> {
        let plan = plan();
        assert_eq!(plan.resolve("Warehouse must be tidy", &[]).await?, Resolution::Unresolved);
        assert_eq!(plan.resolve("Never heard of it", &[]).await?, Resolution::Unresolved);
        assert_eq!(
            PlanResolver::empty().resolve("Batch column must exist", &[]).await?,
            Resolution::Unresolved
        );
        Ok(())
    }

    #[test]
    fn test_rejects_duplicate_checks() {
        let entry = PlanEntry {
            check: "Batch column must exist".into(),
            tool: Some("column_exists".into()),
            args: json!({"column": "Batch"}),
        };
        let res = PlanResolver::new(vec![entry.clone(), entry]);
        assert!(matches!(res, Err(DomainError::InvalidPlan(_))));
    }

    #[test]
    fn test_missing_plan_file() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            PlanResolver::from_file(&dir.path().join("nope.yaml")),
            Err(InfrastructureError::FileNotFound(_))
        ));
    }
}
