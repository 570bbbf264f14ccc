//! Common types and utilities shared across Truth Meter crates.
//!
//! This crate defines the shared error taxonomy, the provider credential
//! wrapper, and observability helpers used throughout the workspace. It is
//! intentionally lightweight so that every crate can depend on it without
//! pulling in HTTP or storage stacks.
//!
//! # Overview
//!
//! - [`TruthMeterError`] and [`Result`]: shared error handling
//! - [`ApiKey`]: provider credential that never prints in full
//! - [`ProviderKind`]: the two supported provider families
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! ```rust
//! use truthmeter_common::{ApiKey, TruthMeterError};
//!
//! let key = ApiKey::new("sk-ant-REDACTED").unwrap();
//! assert_eq!(key.prefix(), "sk-ant-api...");
//!
//! let err = TruthMeterError::NoJsonFound;
//! assert_eq!(err.public_message(), "No valid JSON found in response");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod observability;

/// Number of leading credential characters that may appear in diagnostics.
pub const API_KEY_PREFIX_LEN: usize = 10;

/// Provider family behind a gateway backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Chat-style Messages API.
    Anthropic,
    /// Generate-content API.
    Gemini,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
        }
    }

    /// Human facing name used in error messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "Claude",
            ProviderKind::Gemini => "Gemini",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider credential.
///
/// `Debug` and [`ApiKey::prefix`] only ever reveal the first
/// [`API_KEY_PREFIX_LEN`] characters.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw credential. Blank input yields `None`.
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The full secret, for building outbound requests only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Short non-secret prefix for diagnostics, e.g. `sk-ant-api...`.
    pub fn prefix(&self) -> String {
        let head: String = self.0.chars().take(API_KEY_PREFIX_LEN).collect();
        format!("{head}...")
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.prefix()).finish()
    }
}

/// Error types used across the Truth Meter pipeline.
#[derive(thiserror::Error, Debug)]
pub enum TruthMeterError {
    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider credential is not configured.
    #[error("{} API key not found (set {env_var})", .provider.display_name())]
    ProviderUnavailable {
        provider: ProviderKind,
        env_var: String,
    },

    /// The outbound call failed at the network level or returned a non-success status.
    #[error("{} request failed{}: {detail}", .provider.display_name(), status_suffix(.status))]
    ProviderRequestFailed {
        provider: ProviderKind,
        status: Option<u16>,
        detail: String,
    },

    /// A success response did not carry the expected completion text.
    #[error("Invalid response format from {} API: {detail}", .provider.display_name())]
    MalformedProviderResponse {
        provider: ProviderKind,
        detail: String,
    },

    /// The completion did not contain a `{ ... }` span.
    #[error("No valid JSON found in response")]
    NoJsonFound,

    /// The JSON span could not be parsed into an object.
    #[error("Invalid JSON in response: {0}")]
    InvalidJson(String),

    /// History storage failed. Recovered inside the history store.
    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl TruthMeterError {
    /// Message safe to hand to an end user.
    ///
    /// Upstream bodies and parser diagnostics stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            TruthMeterError::Config(msg) => format!("Configuration error: {msg}"),
            TruthMeterError::ProviderUnavailable { .. } => self.to_string(),
            TruthMeterError::ProviderRequestFailed { .. } => "Failed to analyze content".to_string(),
            TruthMeterError::MalformedProviderResponse { provider, .. } => {
                format!("Invalid response format from {} API", provider.display_name())
            }
            TruthMeterError::NoJsonFound => "No valid JSON found in response".to_string(),
            TruthMeterError::InvalidJson(_) => "Failed to parse analysis result".to_string(),
            TruthMeterError::Persistence(_) => "History storage unavailable".to_string(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Convenient alias for results that use [`TruthMeterError`].
pub type Result<T> = std::result::Result<T, TruthMeterError>;
