use crate::traits::{Completion, ProviderBackend};
use crate::{client_init_error, http_to_provider_error};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use truthmeter_common::{ApiKey, ProviderKind, Result, TruthMeterError};
use truthmeter_config::ProviderConfig;
use truthmeter_http::{Auth, HttpClient, RequestOpts};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiResponseContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponseContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

impl GenerateContentResponse {
    fn into_completion(self, fallback_model: &str) -> Result<Completion> {
        let malformed = |detail: &str| TruthMeterError::MalformedProviderResponse {
            provider: ProviderKind::Gemini,
            detail: detail.to_string(),
        };

        let candidate = self
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| malformed("no candidates returned"))?;

        if candidate.finish_reason.as_deref() == Some("SAFETY") {
            return Err(malformed("content blocked by safety filters"));
        }

        let text = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| malformed("candidate carries no text part"))?;

        Ok(Completion {
            text,
            model: self.model_version.or_else(|| Some(fallback_model.to_string())),
            input_tokens: self
                .usage_metadata
                .as_ref()
                .and_then(|u| u.prompt_token_count),
            output_tokens: self
                .usage_metadata
                .as_ref()
                .and_then(|u| u.candidates_token_count),
        })
    }
}

/// Google generate-content API backend.
///
/// The credential travels as the `key` query parameter, which the HTTP
/// client redacts from its logs.
pub struct GeminiBackend {
    client: HttpClient,
    api_key: Option<ApiKey>,
    api_key_env: String,
    model: String,
    max_output_tokens: u32,
    temperature: f32,
}

impl GeminiBackend {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let client = HttpClient::new(config.base_url())
            .map_err(|e| client_init_error(ProviderKind::Gemini, e))?
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

    fn endpoint(&self) -> String {
        format!("v1beta/models/{}:generateContent", self.model)
    }
}

#[async_trait]
impl ProviderBackend for GeminiBackend {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<Completion> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| TruthMeterError::ProviderUnavailable {
                provider: ProviderKind::Gemini,
                env_var: self.api_key_env.clone(),
            })?;

        tracing::info!(
            provider = "gemini",
            model = %self.model,
            key_prefix = %key.prefix(),
            prompt_chars = prompt.chars().count(),
            max_tokens,
            "provider.request"
        );

        let request = GenerateContentRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_k: 1,
                top_p: 1.0,
                max_output_tokens: max_tokens,
            },
        };

        let opts = RequestOpts {
            auth: Some(Auth::Query {
                name: "key",
                value: key.expose(),
            }),
            ..Default::default()
        };

        let resp: GenerateContentResponse = self
            .client
            .post_json(&self.endpoint(), &request, opts)
            .await
            .map_err(|e| http_to_provider_error(ProviderKind::Gemini, e))?;

        resp.into_completion(&self.model)
    }

    fn provider(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens
    }
}
