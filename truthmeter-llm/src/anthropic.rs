use crate::traits::{Completion, ProviderBackend};
use crate::{client_init_error, http_to_provider_error};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use truthmeter_common::{ApiKey, ProviderKind, Result, TruthMeterError};
use truthmeter_config::ProviderConfig;
use truthmeter_http::{Auth, HttpClient, RequestOpts};

const MESSAGES_PATH: &str = "v1/messages";
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

/// Typed view of the Messages API success body.
///
/// Every field is defaulted so that shape problems surface as
/// `MalformedProviderResponse` from [`MessagesResponse::into_completion`]
/// instead of a decode failure deep inside serde.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

impl MessagesResponse {
    fn into_completion(self) -> Result<Completion> {
        let malformed = |detail: &str| TruthMeterError::MalformedProviderResponse {
            provider: ProviderKind::Anthropic,
            detail: detail.to_string(),
        };

        let first = self
            .content
            .into_iter()
            .next()
            .ok_or_else(|| malformed("response has no content blocks"))?;
        let text = match first.text {
            Some(text) if !text.is_empty() => text,
            _ => {
                return Err(malformed(&format!(
                    "first content block ({}) carries no text",
                    first.kind
                )))
            }
        };

        tracing::debug!(stop_reason = ?self.stop_reason, "anthropic.response.ok");

        Ok(Completion {
            text,
            model: self.model,
            input_tokens: self.usage.as_ref().and_then(|u| u.input_tokens),
            output_tokens: self.usage.as_ref().and_then(|u| u.output_tokens),
        })
    }
}

/// Anthropic Messages API backend.
pub struct AnthropicBackend {
    client: HttpClient,
    api_key: Option<ApiKey>,
    api_key_env: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl AnthropicBackend {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = HttpClient::new(config.base_url())
            .map_err(|e| client_init_error(ProviderKind::Anthropic, e))?
            .with_timeout(config.timeout())
            .with_retries(config.max_retries);

        Ok(Self {
            client,
            api_key: config.credential(),
            api_key_env: config.api_key_env().to_string(),
            model: config.model().to_string(),
            max_output_tokens: config.max_output_tokens(),
            temperature: config.temperature,
        })
    }
}

fn anthropic_version_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "anthropic-version",
        HeaderValue::from_static(ANTHROPIC_VERSION),
    );
    headers
}

#[async_trait]
impl ProviderBackend for AnthropicBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Completion> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| TruthMeterError::ProviderUnavailable {
                provider: ProviderKind::Anthropic,
                env_var: self.api_key_env.clone(),
            })?;

        tracing::info!(
            provider = "anthropic",
            model = %self.model,
            key_prefix = %key.prefix(),
            prompt_chars = prompt.chars().count(),
            max_tokens,
            "provider.request"
        );

        let req = MessagesRequest {
            model: &self.model,
            max_tokens,
            temperature: self.temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let opts = RequestOpts {
            auth: Some(Auth::Header {
                name: "x-api-key",
                value: key.expose(),
            }),
            headers: Some(anthropic_version_headers()),
            ..Default::default()
        };

        let resp: MessagesResponse = self
            .client
            .post_json(MESSAGES_PATH, &req, opts)
            .await
            .map_err(|e| http_to_provider_error(ProviderKind::Anthropic, e))?;

        resp.into_completion()
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}
