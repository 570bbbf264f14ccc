//! Provider gateway backends for Truth Meter.
//!
//! This crate exposes the [`traits::ProviderBackend`] interface and two
//! interchangeable implementations: [`anthropic::AnthropicBackend`] (chat
//! style Messages API) and [`gemini::GeminiBackend`] (generate-content API).
//! [`build_backend`] turns a [`ProviderConfig`] into a shared backend.
//!
//! # Examples
//! ```no_run
//! use truthmeter_common::{ProviderKind, Result};
//! use truthmeter_config::ProviderConfig;
//! use truthmeter_llm::build_backend;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let backend = build_backend(&ProviderConfig::new(ProviderKind::Anthropic))?;
//! let completion = backend.complete("Say hi").await?;
//! println!("{}", completion.text);
//! # Ok(())
//! # }
//! ```
pub mod anthropic;
pub mod gemini;
pub mod traits;

use anthropic::AnthropicBackend;
use gemini::GeminiBackend;
use std::sync::Arc;
use traits::ProviderBackend;
use truthmeter_common::{ProviderKind, TruthMeterError};
use truthmeter_config::ProviderConfig;
use truthmeter_http::HttpError;

pub use traits::Completion;

/// Construct the backend described by `config`.
///
/// Construction never touches the network and succeeds without a
/// credential; the credential check happens on each call.
pub fn build_backend(
    config: &ProviderConfig,
) -> truthmeter_common::Result<Arc<dyn ProviderBackend>> {
    match config.kind {
        ProviderKind::Anthropic => Ok(Arc::new(AnthropicBackend::new(config)?)),
        ProviderKind::Gemini => Ok(Arc::new(GeminiBackend::new(config)?)),
    }
}

pub(crate) fn http_to_provider_error(provider: ProviderKind, e: HttpError) -> TruthMeterError {
    match e {
        HttpError::Decode(message, _) => TruthMeterError::MalformedProviderResponse {
            provider,
            detail: message,
        },
        HttpError::Api {
            status, message, ..
        } => TruthMeterError::ProviderRequestFailed {
            provider,
            status: Some(status.as_u16()),
            detail: message,
        },
        HttpError::Url(_) | HttpError::Build(_) => {
            TruthMeterError::Config(format!("{} client: {e}", provider.display_name()))
        }
        other => TruthMeterError::ProviderRequestFailed {
            provider,
            status: None,
            detail: other.to_string(),
        },
    }
}

pub(crate) fn client_init_error(provider: ProviderKind, e: HttpError) -> TruthMeterError {
    TruthMeterError::Config(format!(
        "{} HTTP client init failed: {e}",
        provider.display_name()
    ))
}
