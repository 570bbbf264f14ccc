use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use truthmeter_common::{ProviderKind, Result};

/// Prompt used by connectivity checks.
pub const PING_PROMPT: &str = "Say \"Hello\"";
/// Output ceiling for connectivity checks.
pub const PING_MAX_TOKENS: u32 = 32;

/// Raw text returned by a provider, with usage when the provider reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Completion {
    pub text: String,
    pub model: Option<String>,
    pub input_tokens: Option<u32>,
    pub output_tokens: Option<u32>,
}

impl Completion {
    /// A completion without usage metadata.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model: None,
            input_tokens: None,
            output_tokens: None,
        }
    }
}

/// One LLM integration behind the gateway.
///
/// Implementations own their credential and perform exactly one outbound
/// call per [`generate`](Self::generate). A missing credential must fail with
/// `ProviderUnavailable` before any network I/O.
#[async_trait]
pub trait ProviderBackend: Send + Sync {
    /// Send `prompt` with the given output-token ceiling.
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Completion>;

    fn provider(&self) -> ProviderKind;

    fn model_name(&self) -> &str;

    /// Output-token ceiling used for analyses.
    fn max_output_tokens(&self) -> u32;

    /// Run an analysis prompt.
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        self.generate(prompt, self.max_output_tokens()).await
    }

    /// Minimal call proving the credential works.
    async fn ping(&self) -> Result<Completion> {
        self.generate(PING_PROMPT, PING_MAX_TOKENS).await
    }
}
