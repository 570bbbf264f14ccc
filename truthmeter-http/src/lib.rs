//! Outbound JSON HTTP client with safe logging, timeouts, and optional retries.
//!
//! - Request options: extra headers, [`Auth`], query params, timeout, retries
//! - Never logs secret values: header auth and secret-looking query params are redacted
//! - Retries 429/5xx and network failures with exponential backoff when a retry
//!   budget is configured (the default budget is zero: one best-effort attempt)
//! - Optional *raw* response logging via `TRUTHMETER_HTTP_RAW=1`
//!
//! ```no_run
//! # async fn demo() -> Result<(), truthmeter_http::HttpError> {
//! let client = truthmeter_http::HttpClient::new("https://api.example.com")?;
//! let got: serde_json::Value = client
//!     .get_json("v1/items", truthmeter_http::RequestOpts::default())
//!     .await?;
//! # Ok(()) }
//! ```

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

const RAW_ENV: &str = "TRUTHMETER_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024;
const SNIPPET_MAX: usize = 500;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const SECRET_QUERY_KEYS: &[&str] = &[
    "access_token",
    "authorization",
    "auth",
    "key",
    "api_key",
    "apikey",
    "token",
    "secret",
    "client_secret",
    "bearer",
];

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("decode error: {0}, body_snippet: {1}")]
    Decode(String, String),
    #[error("server returned error {status}: {message}")]
    Api {
        status: StatusCode,
        message: String,
        body_snippet: String,
    },
}

impl HttpError {
    /// Upstream status for `Api` errors.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            HttpError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ==============================
// Auth & Request Options
// ==============================

/// Authentication strategies supported by the client.
///
/// ```
/// use truthmeter_http::Auth;
///
/// let auth = Auth::Header { name: "x-api-key", value: "secret" };
/// assert_eq!(auth.kind(), "header");
/// ```
#[derive(Clone, Debug)]
pub enum Auth<'a> {
    /// `Authorization: Bearer <token>`
    Bearer(&'a str),
    /// Custom secret header, e.g. `x-api-key`.
    Header { name: &'static str, value: &'a str },
    /// Secret passed as a query parameter, e.g. `key=<token>`.
    Query { name: &'a str, value: &'a str },
    None,
}

impl Auth<'_> {
    /// Auth kind for logs; never the secret.
    pub fn kind(&self) -> &'static str {
        match self {
            Auth::Bearer(_) => "bearer",
            Auth::Header { .. } => "header",
            Auth::Query { .. } => "query",
            Auth::None => "none",
        }
    }
}

/// Per-request tuning knobs.
///
/// ```
/// use truthmeter_http::{Auth, RequestOpts};
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(5)),
///     auth: Some(Auth::Query { name: "key", value: "demo" }),
///     ..Default::default()
/// };
/// assert_eq!(opts.timeout.unwrap().as_secs(), 5);
/// assert!(opts.retries.is_none());
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts<'a> {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    pub auth: Option<Auth<'a>>,
    pub headers: Option<HeaderMap>,
    pub query: Option<Vec<(&'a str, Cow<'a, str>)>>,
}

// ==============================
// Client
// ==============================

#[derive(Clone, Debug)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```
    /// use truthmeter_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://api.example.com")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        // A trailing slash keeps `Url::join` from dropping the last path segment.
        let normalized = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        let base = Url::parse(&normalized).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_timeout: DEFAULT_TIMEOUT,
            max_retries: 0,
        })
    }

    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// GET JSON with per-request options.
    pub async fn get_json<T>(&self, path: &str, opts: RequestOpts<'_>) -> Result<T, HttpError>
    where
        T: DeserializeOwned,
    {
        self.request_json::<(), T>(Method::GET, path, None, opts)
            .await
    }

    /// POST JSON with per-request options.
    pub async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request_json(Method::POST, path, Some(body), opts)
            .await
    }

    async fn request_json<B, T>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: RequestOpts<'_>,
    ) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base
            .join(path.trim_start_matches('/'))
            .map_err(|e| HttpError::Url(e.to_string()))?;

        let body_bytes = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| HttpError::Build(format!("body encode: {e}")))?;

        let mut query: Vec<(&str, &str)> = opts
            .query
            .as_ref()
            .map(|q| q.iter().map(|(k, v)| (*k, v.as_ref())).collect())
            .unwrap_or_default();
        if let Some(Auth::Query { name, value }) = &opts.auth {
            query.push((*name, *value));
        }

        let timeout = opts.timeout.unwrap_or(self.default_timeout);
        let max_retries = opts.retries.unwrap_or(self.max_retries);
        let auth_kind = opts.auth.as_ref().map(Auth::kind).unwrap_or("none");
        let host_path = format!("{}{}", url.host_str().unwrap_or("-"), url.path());
        let redacted_q = redact_query(&query);

        let mut attempt = 0usize;
        loop {
            let mut rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout);
            if !query.is_empty() {
                rb = rb.query(&query);
            }
            if let Some(bytes) = &body_bytes {
                rb = rb
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(bytes.clone());
            }
            if let Some(hdrs) = &opts.headers {
                rb = rb.headers(hdrs.clone());
            }
            match &opts.auth {
                Some(Auth::Bearer(tok)) => {
                    rb = rb.bearer_auth(sanitize_secret(tok)?);
                }
                Some(Auth::Header { name, value }) => {
                    let name = HeaderName::from_bytes(name.as_bytes())
                        .map_err(|e| HttpError::Build(format!("invalid auth header name: {e}")))?;
                    let value = HeaderValue::from_str(&sanitize_secret(value)?)
                        .map_err(|e| HttpError::Build(format!("invalid auth header: {e}")))?;
                    rb = rb.header(name, value);
                }
                Some(Auth::Query { .. }) | Some(Auth::None) | None => {}
            }

            tracing::debug!(
                attempt = attempt + 1,
                max_retries,
                method = %method,
                host_path = %host_path,
                query = ?redacted_q,
                timeout_ms = timeout.as_millis() as u64,
                auth_kind,
                has_body = body_bytes.is_some(),
                "http.request.start"
            );

            let t0 = Instant::now();
            let sent = match rb.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    let headers = resp.headers().clone();
                    resp.bytes().await.map(|b| (status, headers, b))
                }
                Err(err) => Err(err),
            };

            let (status, headers, bytes) = match sent {
                Ok(parts) => parts,
                Err(err) => {
                    let failure = if err.is_timeout() {
                        HttpError::Timeout(timeout)
                    } else {
                        HttpError::Network(err.to_string())
                    };
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            attempt,
                            max_retries,
                            backoff_ms = delay.as_millis() as u64,
                            error = %failure,
                            "http.retrying.network"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(attempt, error = %failure, "http.network_error");
                    return Err(failure);
                }
            };
            let duration_ms = t0.elapsed().as_millis() as u64;

            tracing::debug!(
                %status,
                duration_ms,
                body_len = bytes.len(),
                "http.response.headers"
            );

            if raw_enabled() {
                let cap = bytes.len().min(RAW_MAX_BODY);
                let text = String::from_utf8_lossy(&bytes[..cap]);
                tracing::debug!(
                    target: "http.raw",
                    %status,
                    duration_ms,
                    body = %text,
                    truncated = bytes.len() > RAW_MAX_BODY,
                    "response"
                );
            }

            let snippet = snip_body(&bytes);

            if status.is_success() {
                return serde_json::from_slice::<T>(&bytes).map_err(|e| {
                    tracing::warn!(
                        serde_line = e.line(),
                        serde_col = e.column(),
                        serde_err = %e,
                        body_snippet = %snippet,
                        "http.response.decode_error"
                    );
                    HttpError::Decode(e.to_string(), snippet)
                });
            }

            let message = extract_error_message(&bytes);
            let retryable = status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error();
            if retryable && attempt < max_retries {
                attempt += 1;
                let delay = retry_after(&headers).unwrap_or_else(|| backoff(attempt));
                tracing::warn!(
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms = delay.as_millis() as u64,
                    message = %message,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            tracing::warn!(
                %status,
                message = %message,
                body_snippet = %snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                body_snippet: snippet,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    let shift = attempt.saturating_sub(1).min(6) as u32;
    Duration::from_millis(200u64.saturating_mul(1 << shift))
}

fn retry_after(h: &HeaderMap) -> Option<Duration> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
        .map(Duration::from_secs)
}

/// Pull a human readable message out of common provider error envelopes.
///
/// Handles `{"error":{"message":..}}` (Anthropic, Google, OpenAI), and flat
/// `{"message"|"detail"|"error": "..."}` bodies; falls back to a body snippet.
pub fn extract_error_message(body: &[u8]) -> String {
    #[derive(Deserialize)]
    struct Nested {
        error: NestedDetail,
    }
    #[derive(Deserialize)]
    struct NestedDetail {
        message: String,
    }
    #[derive(Deserialize)]
    struct Flat {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: String,
        #[serde(default)]
        error: String,
    }

    if let Ok(env) = serde_json::from_slice::<Nested>(body) {
        return env.error.message;
    }
    if let Ok(m) = serde_json::from_slice::<Flat>(body) {
        for candidate in [m.message, m.detail, m.error] {
            if !candidate.is_empty() {
                return candidate;
            }
        }
    }
    snip_body(body)
}

fn snip_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.chars().count() > SNIPPET_MAX {
        let mut snip: String = text.chars().take(SNIPPET_MAX).collect();
        snip.push_str("...");
        snip
    } else {
        text.into_owned()
    }
}

fn redact_query(query: &[(&str, &str)]) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(k, v)| {
            let secret = SECRET_QUERY_KEYS.contains(&k.to_ascii_lowercase().as_str());
            (
                (*k).to_string(),
                if secret {
                    "<redacted>".to_string()
                } else {
                    (*v).to_string()
                },
            )
        })
        .collect()
}

fn sanitize_secret(raw: &str) -> Result<String, HttpError> {
    let mut s = raw
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();
    s.retain(|ch| !ch.is_ascii_whitespace());

    if !s.is_ascii() {
        return Err(HttpError::Build("API key contains non-ASCII bytes".into()));
    }
    if s.bytes().any(|b| b < 0x20 || b == 0x7F) {
        return Err(HttpError::Build(
            "API key contains control characters".into(),
        ));
    }
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_error_message_is_extracted() {
        let body = br#"{"type":"error","error":{"type":"authentication_error","message":"invalid x-api-key"}}"#;
        assert_eq!(extract_error_message(body), "invalid x-api-key");
    }

    #[test]
    fn flat_error_message_is_extracted() {
        assert_eq!(extract_error_message(br#"{"detail":"nope"}"#), "nope");
    }

    #[test]
    fn unknown_bodies_fall_back_to_snippet() {
        let body = "x".repeat(SNIPPET_MAX + 20);
        let msg = extract_error_message(body.as_bytes());
        assert_eq!(msg.len(), SNIPPET_MAX + 3);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn secret_query_params_are_redacted() {
        let redacted = redact_query(&[("key", "AIzaSecret"), ("alt", "json")]);
        assert_eq!(redacted[0], ("key".to_string(), "<redacted>".to_string()));
        assert_eq!(redacted[1], ("alt".to_string(), "json".to_string()));
    }

    #[test]
    fn secrets_are_trimmed_of_quotes_and_whitespace() {
        assert_eq!(sanitize_secret(" \"abc def\"\n").unwrap(), "abcdef");
        assert!(sanitize_secret("clé").is_err());
    }

    #[test]
    fn backoff_grows_and_caps() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(50), backoff(7));
    }

    #[test]
    fn base_without_trailing_slash_keeps_path() {
        let client = HttpClient::new("http://localhost:9/v1beta").unwrap();
        let joined = client.base().join("models/x:generateContent").unwrap();
        assert_eq!(joined.path(), "/v1beta/models/x:generateContent");
    }
}
