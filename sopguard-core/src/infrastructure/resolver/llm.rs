// sopguard-core/src/infrastructure/resolver/llm.rs

//! Chat-completion intent resolver (OpenAI and Azure OpenAI URL layouts).

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::domain::catalog::{RawIntent, ToolDescriptor};
use crate::infrastructure::config::ResolverConfig;
use crate::ports::resolver::{IntentResolver, Resolution, ResolverError};

const SYSTEM_PROMPT: &str = "You are a precise SOP check intent router. Given one check line, \
choose exactly one tool and arguments. Return strict JSON only: {\"tool\": <name>, \"args\": {..}}. \
If ambiguous, infer the most likely intent. \
Datasets available: stock, master, gr (Goods Receipt). Common columns: stock/master -> Material Code, \
Batch, Date of Manufacturing; gr -> Material Document. \
When check mentions MB51/GR, use dataset 'gr'. For manufacturing date vs documentation, compare stock \
vs master on keys ['Material Code','Batch'] and column 'Date of Manufacturing'.";

fn re_json_object() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{[\s\S]*\}").unwrap_or_else(|_| Regex::new("$^").unwrap_or_else(|_| unreachable!()))
    })
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LlmResolver {
    client: Client,
    url: String,
    api_key: String,
    model: String,
    temperature: f32,
    azure: bool,
}

impl LlmResolver {
    pub fn new(config: &ResolverConfig) -> Result<Self, ResolverError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ResolverError::NotConfigured("missing API key".into()))?;
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| ResolverError::NotConfigured("missing endpoint".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            url: completions_url(endpoint, &config.model, config.api_version.as_deref()),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            azure: config.api_version.is_some(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Azure layout when an API version is given, plain OpenAI layout otherwise.
fn completions_url(endpoint: &str, model: &str, api_version: Option<&str>) -> String {
    let base = endpoint.trim_end_matches('/');
    match api_version {
        Some(version) => format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            base, model, version
        ),
        None => format!("{}/chat/completions", base),
    }
}

fn build_messages(check: &str, catalog: &[ToolDescriptor]) -> Result<Vec<ChatMessage>, ResolverError> {
    let tools = serde_json::to_string(catalog)
        .map_err(|e| ResolverError::MalformedResponse(format!("cannot encode catalog: {}", e)))?;
    Ok(vec![
        ChatMessage {
            role: "system",
            content: format!("{} Tools:{}", SYSTEM_PROMPT, tools),
        },
        ChatMessage {
            role: "user",
            content: check.to_string(),
        },
    ])
}

/// Reads `{tool, args}` out of the model's answer. Prose around a JSON object
/// is tolerated; an answer without both keys means the rule was not routed.
fn parse_content(content: &str) -> Result<Resolution, ResolverError> {
    if content.trim().is_empty() {
        return Ok(Resolution::Unresolved);
    }

    let data: JsonValue = match serde_json::from_str(content) {
        Ok(v) => v,
        Err(_) => {
            let Some(found) = re_json_object().find(content) else {
                return Ok(Resolution::Unresolved);
            };
            serde_json::from_str(found.as_str())
                .map_err(|e| ResolverError::MalformedResponse(e.to_string()))?
        }
    };

    let JsonValue::Object(mut map) = data else {
        return Ok(Resolution::Unresolved);
    };
    let (Some(tool), Some(args)) = (map.remove("tool"), map.remove("args")) else {
        return Ok(Resolution::Unresolved);
    };
    match tool {
        JsonValue::String(tool) => Ok(Resolution::Resolved(RawIntent::new(tool, args))),
        other => {
            warn!(tool = %other, "Resolver proposed a non-string tool name");
            Ok(Resolution::Unresolved)
        }
    }
}

#[async_trait]
impl IntentResolver for LlmResolver {
    #[instrument(skip(self, catalog), fields(model = %self.model))]
    async fn resolve(
        &self,
        check: &str,
        catalog: &[ToolDescriptor],
    ) -> Result<Resolution, ResolverError> {
        let body = ChatRequest {
            model: &self.model,
            messages: build_messages(check, catalog)?,
            temperature: self.temperature,
        };

        let request = self.client.post(&self.url).json(&body);
        let request = if self.azure {
            request.header("api-key", &self.api_key)
        } else {
            request.bearer_auth(&self.api_key)
        };

        let response = request
            .send()
            .await
            .map_err(|e| ResolverError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResolverError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| ResolverError::MalformedResponse(e.to_string()))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(content = %content, "Raw resolver answer");

        parse_content(&content)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::catalog::describe_catalog;
    use serde_json::json;

    fn resolved(content: &str) -> RawIntent {
        match parse_content(content).unwrap() {
            Resolution::Resolved(intent) => intent,
            Resolution::Unresolved => panic!("expected a resolved intent for {content}"),
        }
    }

    #[test]
    fn test_completions_url_layouts() {
        assert_eq!(
            completions_url("https://acme.openai.azure.com/", "gpt-4o-mini", Some("2024-02-01")),
            "https://acme.openai.azure.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-02-01"
        );
        assert_eq!(
            completions_url("https://api.openai.com/v1", "gpt-4o-mini", None),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_new_requires_key_and_endpoint() {
        let mut config = ResolverConfig::default();
        assert!(matches!(
            LlmResolver::new(&config),
            Err(ResolverError::NotConfigured(_))
        ));

        config.api_key = Some("secret".into());
        config.endpoint = Some("https://api.openai.com/v1".into());
        let resolver = LlmResolver::new(&config).unwrap();
        assert_eq!(resolver.url(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn test_system_prompt_carries_catalog() {
        let messages = build_messages("Batch must exist", &describe_catalog()).unwrap();
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("\"name\":\"match_master_on_keys\""));
        assert!(messages[0].content.contains("MB51/GR"));
        assert_eq!(messages[1].content, "Batch must exist");
    }

    #[test]
    fn test_parse_plain_json() {
        let intent = resolved(r#"{"tool": "column_exists", "args": {"column": "Batch"}}"#);
        assert_eq!(intent.tool, "column_exists");
        assert_eq!(intent.args, json!({"column": "Batch"}));
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let content = "Sure! Here is the routing:\n```json\n{\"tool\": \"row_condition\", \"args\": {\"expr\": \"`Current Stock` > 0\"}}\n```";
        let intent = resolved(content);
        assert_eq!(intent.tool, "row_condition");
        assert_eq!(intent.args["expr"], "`Current Stock` > 0");
    }

    #[test]
    fn test_parse_unroutable_answers() {
        for content in ["", "I cannot map this rule.", r#"{"tool": "column_exists"}"#, "[1, 2]"] {
            assert_eq!(parse_content(content).unwrap(), Resolution::Unresolved, "{content}");
        }
    }

    #[test]
    fn test_parse_broken_json_is_an_error() {
        assert!(matches!(
            parse_content("answer: {\"tool\": \"column_exists\", args}"),
            Err(ResolverError::MalformedResponse(_))
        ));
    }
}
