// sopguard-core/src/infrastructure/config/project.rs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use validator::Validate;

use crate::infrastructure::error::InfrastructureError;

const CONFIG_CANDIDATES: [&str; 2] = ["sopguard.yaml", "sopguard.yml"];
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SopGuardConfig {
    #[validate(nested)]
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Frozen "today" for date checks. Unset means the local date at run time.
    #[serde(default)]
    pub reference_date: Option<NaiveDate>,
}

/// Chat-completion endpoint used to route rules to catalog tools.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ResolverConfig {
    #[serde(default)]
    pub endpoint: Option<String>,

    #[validate(length(min = 1, message = "Model name cannot be empty"))]
    #[serde(default = "default_model")]
    pub model: String,

    /// Azure OpenAI API version. When set, requests use the Azure URL layout.
    #[serde(default)]
    pub api_version: Option<String>,

    #[validate(range(min = 0.0, max = 2.0))]
    #[serde(default)]
    pub temperature: f32,

    #[validate(range(min = 1))]
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    // Environment only, never read from or written to the file
    #[serde(skip)]
    pub api_key: Option<String>,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: default_model(),
            api_version: None,
            temperature: 0.0,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            api_key: None,
        }
    }
}

impl ResolverConfig {
    /// Both a key and an endpoint are needed before any request can be made.
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() && self.endpoint.is_some()
    }
}

// --- LOADER ---

#[instrument(skip(project_dir))]
pub fn load_config(project_dir: &Path) -> Result<SopGuardConfig, InfrastructureError> {
    load_config_with_env(project_dir, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with_env<F>(project_dir: &Path, env: F) -> Result<SopGuardConfig, InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    // 1. Fichier optionnel : sans lui, on part des valeurs par défaut
    let mut config = match find_main_config(project_dir) {
        Some(path) => {
            info!(path = ?path, "Loading sopguard configuration");
            let content = fs::read_to_string(&path)?;
            serde_yaml::from_str(&content)?
        }
        None => {
            debug!(dir = ?project_dir, "No sopguard.yaml found, using defaults");
            SopGuardConfig::default()
        }
    };

    // 2. Override via Variables d'Environnement (Pattern 'Layering')
    apply_env_overrides(&mut config, &env)?;

    // 3. Validation finale
    config.validate()?;
    Ok(config)
}

fn find_main_config(root: &Path) -> Option<PathBuf> {
    CONFIG_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|p| p.exists())
}

/// First non-empty value among `keys`.
fn first_env<F>(env: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| env(key))
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

fn apply_env_overrides<F>(config: &mut SopGuardConfig, env: &F) -> Result<(), InfrastructureError>
where
    F: Fn(&str) -> Option<String>,
{
    let resolver = &mut config.resolver;

    resolver.api_key = first_env(env, &["LLMFOUNDRY_TOKEN", "OPENAI_API_KEY"]);

    if let Some(val) = first_env(env, &["base_url", "OPENAI_BASE_URL"]) {
        info!(old = ?resolver.endpoint, new = ?val, "Overriding resolver endpoint via ENV");
        resolver.endpoint = Some(val);
    }
    if let Some(val) = first_env(env, &["AZURE_API_VERSION", "OPENAI_API_VERSION"]) {
        info!(old = ?resolver.api_version, new = ?val, "Overriding API version via ENV");
        resolver.api_version = Some(val);
    }
    if let Some(val) = first_env(env, &["OPENAI_MODEL"]) {
        info!(old = ?resolver.model, new = ?val, "Overriding model via ENV");
        resolver.model = val;
    }
    if let Some(val) = first_env(env, &["SOPGUARD_REFERENCE_DATE"]) {
        let date = NaiveDate::parse_from_str(&val, "%Y-%m-%d").map_err(|e| {
            InfrastructureError::ConfigError(format!(
                "SOPGUARD_REFERENCE_DATE must be YYYY-MM-DD, got '{}': {}",
                val, e
            ))
        })?;
        info!(old = ?config.reference_date, new = ?date, "Overriding reference date via ENV");
        config.reference_date = Some(date);
    }

    Ok(())
}
