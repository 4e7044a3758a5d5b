// sopguard-core/src/ports/resolver.rs

// The boundary between a free-text SOP rule and the operation catalog.
// Whatever sits behind it (a chat model, a static plan, a test double) only
// proposes an intent: the dispatcher still validates it against the catalog.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::domain::catalog::RawIntent;
use crate::domain::catalog::ToolDescriptor;

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(RawIntent),
    /// The resolver answered but could not map the rule to any tool.
    Unresolved,
}

#[derive(Error, Debug, Diagnostic)]
pub enum ResolverError {
    #[error("Intent resolver is not configured: {0}")]
    #[diagnostic(
        code(sopguard::resolver::not_configured),
        help("Set LLMFOUNDRY_TOKEN (or OPENAI_API_KEY) and base_url (or OPENAI_BASE_URL).")
    )]
    NotConfigured(String),

    #[error("Resolver request failed: {0}")]
    #[diagnostic(code(sopguard::resolver::transport))]
    Transport(String),

    #[error("Resolver returned HTTP {status}: {body}")]
    #[diagnostic(code(sopguard::resolver::status))]
    Status { status: u16, body: String },

    #[error("Malformed resolver response: {0}")]
    #[diagnostic(code(sopguard::resolver::malformed))]
    MalformedResponse(String),
}

#[async_trait]
pub trait IntentResolver: Send + Sync {
    /// Maps one rule sentence to a `{tool, args}` proposal. `catalog` is the
    /// full list of operations the rule may resolve to.
    async fn resolve(
        &self,
        check: &str,
        catalog: &[ToolDescriptor],
    ) -> Result<Resolution, ResolverError>;
}
