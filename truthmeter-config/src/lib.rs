//! Loader for Truth Meter configuration with YAML + environment overlays.
//!
//! Precedence, lowest to highest: built-in defaults, YAML sources in the
//! order they were added, then `TRUTHMETER__`-prefixed environment variables
//! (`__` separates nesting levels, e.g. `TRUTHMETER__SERVER__BIND`). After
//! merging, `${VAR}` placeholders in string values are expanded from the
//! process environment, and provider credentials are resolved once from the
//! environment variable each provider names (`CLAUDE_API_KEY`,
//! `GEMINI_API_KEY` by default).
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use truthmeter_common::observability::LogFormat;
use truthmeter_common::{ApiKey, ProviderKind};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Environment prefix for overrides.
pub const ENV_PREFIX: &str = "TRUTHMETER";
/// Config file consulted by the CLI when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "truthmeter.yaml";
/// Storage key under which the history array is persisted.
pub const DEFAULT_HISTORY_KEY: &str = "ai-truth-meter-history";
/// Maximum number of retained history entries.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;
/// Approximate prompt token budget for submitted content.
pub const DEFAULT_TOKEN_BUDGET: usize = 500;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TruthMeterConfig {
    pub server: ServerConfig,
    pub analysis: AnalysisConfig,
    pub providers: ProvidersConfig,
    pub history: HistoryConfig,
    pub pricing: PricingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:3001".into(),
        }
    }
}

/// How the JSON object is located inside a completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Depth-tracking scan that stops at the first closed object.
    #[default]
    Balanced,
    /// First `{` through last `}`.
    Greedy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub token_budget: usize,
    pub extraction: ExtractionMode,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            token_budget: DEFAULT_TOKEN_BUDGET,
            extraction: ExtractionMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Backend behind `/api/analyze` and `/api/test`.
    pub primary: ProviderConfig,
    /// Backend behind the serverless-style `analyze-content` endpoint.
    pub alternate: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: ProviderConfig::new(ProviderKind::Anthropic),
            alternate: ProviderConfig::new(ProviderKind::Gemini),
        }
    }
}

/// One provider backend. Unset fields fall back to per-kind defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Explicit credential. Filled from `api_key_env` at load when absent.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub max_output_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub max_retries: usize,
}

fn default_timeout_secs() -> u64 {
    30
}

impl ProviderConfig {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            model: None,
            api_key_env: None,
            api_key: None,
            base_url: None,
            max_output_tokens: None,
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            max_retries: 0,
        }
    }

    /// Builder-style credential override, mostly for tests.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Builder-style endpoint override, mostly for tests.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(match self.kind {
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::Gemini => "gemini-pro",
        })
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(match self.kind {
            ProviderKind::Anthropic => "CLAUDE_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(match self.kind {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::Gemini => "https://generativelanguage.googleapis.com",
        })
    }

    pub fn max_output_tokens(&self) -> u32 {
        self.max_output_tokens.unwrap_or(match self.kind {
            ProviderKind::Anthropic => 1200,
            ProviderKind::Gemini => 2048,
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The configured credential, if any.
    pub fn credential(&self) -> Option<ApiKey> {
        self.api_key.as_deref().and_then(ApiKey::new)
    }

    fn resolve_credential(&mut self) {
        let usable = self
            .api_key
            .as_deref()
            .is_some_and(|k| !k.trim().is_empty() && !k.contains("${"));
        if !usable {
            self.api_key = std::env::var(self.api_key_env())
                .ok()
                .filter(|k| !k.trim().is_empty());
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryBackend {
    Memory,
    #[default]
    File,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub backend: HistoryBackend,
    /// Storage location; defaults under the user data directory.
    pub path: Option<PathBuf>,
    pub capacity: usize,
    pub key: String,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: HistoryBackend::default(),
            path: None,
            capacity: DEFAULT_HISTORY_CAPACITY,
            key: DEFAULT_HISTORY_KEY.into(),
        }
    }
}

impl HistoryConfig {
    /// Resolved storage path for file-like backends.
    pub fn resolved_path(&self) -> PathBuf {
        if let Some(p) = &self.path {
            return p.clone();
        }
        let file = match self.backend {
            HistoryBackend::Sqlite => "history.db",
            HistoryBackend::File | HistoryBackend::Memory => "history.json",
        };
        dirs::data_dir()
            .map(|d| d.join("truthmeter"))
            .unwrap_or_else(|| truthmeter_common::observability::default_data_dir("truthmeter"))
            .join(file)
    }
}

/// USD rates used for the per-analysis cost estimate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            input_per_1k: 0.003,
            output_per_1k: 0.015,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    pub filter: String,
    pub stderr: bool,
    pub file: bool,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".into(),
            stderr: true,
            file: true,
            dir: None,
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML + env overrides).
pub struct TruthMeterConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_overrides: bool,
}

impl Default for TruthMeterConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TruthMeterConfigLoader {
    /// Start with no files; `TRUTHMETER__` env overrides are applied at [`load`](Self::load).
    ///
    /// ```
    /// use truthmeter_config::TruthMeterConfigLoader;
    ///
    /// let config = TruthMeterConfigLoader::new()
    ///     .with_yaml_str("server:\n  bind: '0.0.0.0:8080'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.server.bind, "0.0.0.0:8080");
    /// assert_eq!(config.history.capacity, 100);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_overrides: true,
        }
    }

    /// Attach a required YAML/TOML/JSON file; format is inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use truthmeter_common::ProviderKind;
    /// use truthmeter_config::TruthMeterConfigLoader;
    ///
    /// let cfg = TruthMeterConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// providers:
    ///   primary:
    ///     kind: gemini
    ///     model: gemini-1.5-flash
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.providers.primary.kind, ProviderKind::Gemini);
    /// assert_eq!(cfg.providers.primary.model(), "gemini-1.5-flash");
    /// assert_eq!(cfg.providers.primary.api_key_env(), "GEMINI_API_KEY");
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self.builder.add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Skip the `TRUTHMETER__` environment overlay.
    pub fn without_env_overrides(mut self) -> Self {
        self.env_overrides = false;
        self
    }

    /// Consume the builder and deserialize the merged sources into typed config.
    pub fn load(self) -> Result<TruthMeterConfig, ConfigError> {
        let mut builder = self.builder;
        if self.env_overrides {
            builder = builder.add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );
        }
        let cfg = builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let mut typed: TruthMeterConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        typed.providers.primary.resolve_credential();
        typed.providers.alternate.resolve_credential();
        validate(&typed)?;

        Ok(typed)
    }
}

fn validate(cfg: &TruthMeterConfig) -> Result<(), ConfigError> {
    if cfg.history.capacity == 0 {
        return Err(ConfigError::Message(
            "history.capacity must be at least 1".into(),
        ));
    }
    if cfg.analysis.token_budget == 0 {
        return Err(ConfigError::Message(
            "analysis.token_budget must be at least 1".into(),
        ));
    }
    if cfg.history.key.trim().is_empty() {
        return Err(ConfigError::Message("history.key must not be empty".into()));
    }
    Ok(())
}
