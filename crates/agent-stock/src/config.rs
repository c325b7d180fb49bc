//! Process-wide configuration for the stock report pipeline
//!
//! Loaded once at startup (from the environment, usually after `.env` has
//! been applied), validated, then shared immutably as `Arc<AppConfig>`.

use crate::error::{Result, StockError};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_APP_KEY: &str = "LONGBRIDGE_APP_KEY";
pub const ENV_APP_SECRET: &str = "LONGBRIDGE_APP_SECRET";
pub const ENV_ACCESS_TOKEN: &str = "LONGBRIDGE_ACCESS_TOKEN";
pub const ENV_PROVIDER: &str = "MARKET_DATA_PROVIDER";
pub const ENV_STOCK_LIST: &str = "STOCK_LIST";
pub const ENV_LLM_BACKEND: &str = "LLM_BACKEND";
pub const ENV_OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";
pub const ENV_OLLAMA_MODEL: &str = "OLLAMA_MODEL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OUTPUT_DIR: &str = "OUTPUT_DIR";
pub const ENV_STRATEGY_PATH: &str = "STRATEGY_PATH";
pub const ENV_FETCH_POLICY: &str = "FETCH_POLICY";
pub const ENV_LLM_TIMEOUT_SECS: &str = "LLM_TIMEOUT_SECS";

const DEFAULT_STOCK_LIST: &str = "NVDA.US,AAPL.US";
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "deepseek-r1:8b";
const DEFAULT_OUTPUT_DIR: &str = "report";
const DEFAULT_STRATEGY_PATH: &str = "strategies/rating.md";

/// Market data provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataProvider {
    /// Yahoo Finance (no credentials required)
    #[default]
    Yahoo,
    /// Longbridge OpenAPI (requires the credential triple)
    Longbridge,
}

impl DataProvider {
    /// Human-readable source name used in reports
    pub fn label(self) -> &'static str {
        match self {
            Self::Yahoo => "Yahoo Finance",
            Self::Longbridge => "Longbridge OpenAPI",
        }
    }
}

impl FromStr for DataProvider {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yahoo" => Ok(Self::Yahoo),
            "longbridge" | "longport" => Ok(Self::Longbridge),
            other => Err(StockError::ConfigError(format!(
                "Unknown market data provider '{other}' (expected yahoo or longbridge)"
            ))),
        }
    }
}

/// Reasoning backend protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmBackend {
    /// Ollama native chat API
    #[default]
    Ollama,
    /// Any OpenAI-compatible chat-completions server
    OpenAI,
}

impl LlmBackend {
    /// Human-readable backend name used in reports
    pub fn label(self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI-compatible",
        }
    }
}

impl FromStr for LlmBackend {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            other => Err(StockError::ConfigError(format!(
                "Unknown LLM backend '{other}' (expected ollama or openai)"
            ))),
        }
    }
}

/// What the fetch stage does when some symbols cannot be retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchPolicy {
    /// Fail the whole stage if any symbol is missing
    #[default]
    Strict,
    /// Drop missing symbols and report them alongside the data
    Degrade,
}

impl FromStr for FetchPolicy {
    type Err = StockError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "degrade" => Ok(Self::Degrade),
            other => Err(StockError::ConfigError(format!(
                "Unknown fetch policy '{other}' (expected strict or degrade)"
            ))),
        }
    }
}

/// Longbridge OpenAPI credential triple
#[derive(Clone, PartialEq, Eq)]
pub struct LongbridgeCredentials {
    pub app_key: String,
    pub app_secret: String,
    pub access_token: String,
}

impl fmt::Debug for LongbridgeCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LongbridgeCredentials")
            .field("app_key", &"<redacted>")
            .field("app_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Configuration for the stock report pipeline
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Market data provider to use
    pub provider: DataProvider,

    /// Longbridge credentials, required when `provider` is Longbridge
    pub credentials: Option<LongbridgeCredentials>,

    /// Default symbols, in the order they were configured
    pub symbols: Vec<String>,

    /// Reasoning backend protocol
    pub llm_backend: LlmBackend,

    /// Reasoning backend base URL
    pub llm_base_url: String,

    /// Reasoning backend model identifier
    pub llm_model: String,

    /// API key for OpenAI-compatible backends
    pub llm_api_key: Option<String>,

    /// Sampling temperature
    pub temperature: f32,

    /// Maximum tokens to generate per analysis
    pub max_tokens: usize,

    /// Timeout for a single backend call
    pub llm_timeout: Duration,

    /// Maximum attempts for a backend call
    pub max_retries: u32,

    /// Timeout for a single market data call
    pub request_timeout: Duration,

    /// Where reports and the report index are written
    pub output_dir: PathBuf,

    /// Strategy definition read on every analysis
    pub strategy_path: PathBuf,

    /// Partial-failure policy for the fetch stage
    pub fetch_policy: FetchPolicy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: DataProvider::Yahoo,
            credentials: None,
            symbols: parse_symbol_list(DEFAULT_STOCK_LIST),
            llm_backend: LlmBackend::Ollama,
            llm_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            llm_model: DEFAULT_OLLAMA_MODEL.to_string(),
            llm_api_key: None,
            temperature: 0.7,
            max_tokens: 8192,
            llm_timeout: Duration::from_secs(300),
            max_retries: 3,
            request_timeout: Duration::from_secs(30),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            strategy_path: PathBuf::from(DEFAULT_STRATEGY_PATH),
            fetch_policy: FetchPolicy::Strict,
        }
    }
}

/// Split a comma-delimited symbol list, keeping order and dropping blanks
pub fn parse_symbol_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

impl AppConfig {
    /// Create a new configuration builder
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Load configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Blank values count as unset. The provider defaults to Longbridge when
    /// the full credential triple is present, Yahoo otherwise.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let credentials = match (get(ENV_APP_KEY), get(ENV_APP_SECRET), get(ENV_ACCESS_TOKEN)) {
            (Some(app_key), Some(app_secret), Some(access_token)) => Some(LongbridgeCredentials {
                app_key,
                app_secret,
                access_token,
            }),
            _ => None,
        };

        let mut builder = Self::builder();
        builder = match get(ENV_PROVIDER) {
            Some(raw) => builder.provider(raw.parse()?),
            None if credentials.is_some() => builder.provider(DataProvider::Longbridge),
            None => builder,
        };
        if let Some(credentials) = credentials {
            builder = builder.credentials(credentials);
        }
        if let Some(list) = get(ENV_STOCK_LIST) {
            builder = builder.symbols(parse_symbol_list(&list));
        }
        if let Some(raw) = get(ENV_LLM_BACKEND) {
            builder = builder.llm_backend(raw.parse()?);
        }
        if let Some(url) = get(ENV_OLLAMA_BASE_URL) {
            builder = builder.llm_base_url(url);
        }
        if let Some(model) = get(ENV_OLLAMA_MODEL) {
            builder = builder.llm_model(model);
        }
        if let Some(key) = get(ENV_OPENAI_API_KEY) {
            builder = builder.llm_api_key(key);
        }
        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            builder = builder.output_dir(dir);
        }
        if let Some(path) = get(ENV_STRATEGY_PATH) {
            builder = builder.strategy_path(path);
        }
        if let Some(raw) = get(ENV_FETCH_POLICY) {
            builder = builder.fetch_policy(raw.parse()?);
        }
        if let Some(raw) = get(ENV_LLM_TIMEOUT_SECS) {
            let secs = raw.parse::<u64>().map_err(|e| {
                StockError::ConfigError(format!("{ENV_LLM_TIMEOUT_SECS} must be an integer: {e}"))
            })?;
            builder = builder.llm_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.provider == DataProvider::Longbridge && self.credentials.is_none() {
            return Err(StockError::ConfigError(format!(
                "Longbridge provider requires {ENV_APP_KEY}, {ENV_APP_SECRET} and {ENV_ACCESS_TOKEN}"
            )));
        }

        if self.symbols.is_empty() {
            return Err(StockError::ConfigError(
                "stock list must contain at least one symbol".to_string(),
            ));
        }

        if self.llm_model.trim().is_empty() {
            return Err(StockError::ConfigError("model identifier must not be empty".to_string()));
        }

        url::Url::parse(&self.llm_base_url).map_err(|e| {
            StockError::ConfigError(format!("invalid backend URL '{}': {e}", self.llm_base_url))
        })?;

        if self.max_retries == 0 {
            return Err(StockError::ConfigError(
                "max_retries must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(StockError::ConfigError(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }

        Ok(())
    }

    /// Snapshot safe to log or print (credentials reduced to a flag)
    pub fn summary(&self) -> ConfigSummary {
        ConfigSummary {
            provider: self.provider,
            has_credentials: self.credentials.is_some(),
            symbols: self.symbols.clone(),
            llm_backend: self.llm_backend,
            llm_base_url: self.llm_base_url.clone(),
            llm_model: self.llm_model.clone(),
            output_dir: self.output_dir.display().to_string(),
            strategy_path: self.strategy_path.display().to_string(),
            fetch_policy: self.fetch_policy,
        }
    }
}

/// Redacted view of [`AppConfig`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigSummary {
    pub provider: DataProvider,
    pub has_credentials: bool,
    pub symbols: Vec<String>,
    pub llm_backend: LlmBackend,
    pub llm_base_url: String,
    pub llm_model: String,
    pub output_dir: String,
    pub strategy_path: String,
    pub fetch_policy: FetchPolicy,
}

/// Builder for AppConfig
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    provider: Option<DataProvider>,
    credentials: Option<LongbridgeCredentials>,
    symbols: Option<Vec<String>>,
    llm_backend: Option<LlmBackend>,
    llm_base_url: Option<String>,
    llm_model: Option<String>,
    llm_api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
    llm_timeout: Option<Duration>,
    max_retries: Option<u32>,
    request_timeout: Option<Duration>,
    output_dir: Option<PathBuf>,
    strategy_path: Option<PathBuf>,
    fetch_policy: Option<FetchPolicy>,
}

impl AppConfigBuilder {
    /// Set the market data provider
    pub fn provider(mut self, provider: DataProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the Longbridge credentials
    pub fn credentials(mut self, credentials: LongbridgeCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    /// Set the default symbol list
    pub fn symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.symbols = Some(symbols.into_iter().map(Into::into).collect());
        self
    }

    /// Set the reasoning backend protocol
    pub fn llm_backend(mut self, backend: LlmBackend) -> Self {
        self.llm_backend = Some(backend);
        self
    }

    /// Set the reasoning backend base URL
    pub fn llm_base_url(mut self, url: impl Into<String>) -> Self {
        self.llm_base_url = Some(url.into());
        self
    }

    /// Set the reasoning backend model
    pub fn llm_model(mut self, model: impl Into<String>) -> Self {
        self.llm_model = Some(model.into());
        self
    }

    /// Set the API key for OpenAI-compatible backends
    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.llm_api_key = Some(key.into());
        self
    }

    /// Set the sampling temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens per analysis
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the backend call timeout
    pub fn llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = Some(timeout);
        self
    }

    /// Set maximum backend attempts
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the market data call timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the report output directory
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Set the strategy definition path
    pub fn strategy_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.strategy_path = Some(path.into());
        self
    }

    /// Set the fetch partial-failure policy
    pub fn fetch_policy(mut self, policy: FetchPolicy) -> Self {
        self.fetch_policy = Some(policy);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<AppConfig> {
        let defaults = AppConfig::default();

        let config = AppConfig {
            provider: self.provider.unwrap_or(defaults.provider),
            credentials: self.credentials,
            symbols: self.symbols.unwrap_or(defaults.symbols),
            llm_backend: self.llm_backend.unwrap_or(defaults.llm_backend),
            llm_base_url: self.llm_base_url.unwrap_or(defaults.llm_base_url),
            llm_model: self.llm_model.unwrap_or(defaults.llm_model),
            llm_api_key: self.llm_api_key,
            temperature: self.temperature.unwrap_or(defaults.temperature),
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            llm_timeout: self.llm_timeout.unwrap_or(defaults.llm_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            output_dir: self.output_dir.unwrap_or(defaults.output_dir),
            strategy_path: self.strategy_path.unwrap_or(defaults.strategy_path),
            fetch_policy: self.fetch_policy.unwrap_or(defaults.fetch_policy),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.provider, DataProvider::Yahoo);
        assert_eq!(config.symbols, vec!["NVDA.US", "AAPL.US"]);
        assert_eq!(config.llm_model, "deepseek-r1:8b");
        assert_eq!(config.fetch_policy, FetchPolicy::Strict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_symbol_list_keeps_order() {
        assert_eq!(
            parse_symbol_list(" BABA.US, NVDA.US,,TSLA.US ,"),
            vec!["BABA.US", "NVDA.US", "TSLA.US"]
        );
        assert!(parse_symbol_list(" , ").is_empty());
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, DataProvider::Yahoo);
        assert_eq!(config.llm_base_url, "http://localhost:11434");
        assert_eq!(config.output_dir, PathBuf::from("report"));
        assert_eq!(config.strategy_path, PathBuf::from("strategies/rating.md"));
    }

    #[test]
    fn test_from_lookup_with_credentials_selects_longbridge() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_APP_KEY, "key"),
            (ENV_APP_SECRET, "secret"),
            (ENV_ACCESS_TOKEN, "token"),
            (ENV_STOCK_LIST, "00700.HK,NVDA.US"),
            (ENV_OLLAMA_MODEL, "qwen2.5:14b"),
            (ENV_FETCH_POLICY, "degrade"),
        ]))
        .unwrap();

        assert_eq!(config.provider, DataProvider::Longbridge);
        assert_eq!(config.symbols, vec!["00700.HK", "NVDA.US"]);
        assert_eq!(config.llm_model, "qwen2.5:14b");
        assert_eq!(config.fetch_policy, FetchPolicy::Degrade);
        assert_eq!(
            config.credentials.as_ref().map(|c| c.app_key.as_str()),
            Some("key")
        );
    }

    #[test]
    fn test_longbridge_without_credentials_is_rejected() {
        let result = AppConfig::from_lookup(lookup(&[
            (ENV_PROVIDER, "longbridge"),
            (ENV_APP_KEY, "key"),
        ]));
        assert!(matches!(result, Err(StockError::ConfigError(_))));
    }

    #[test]
    fn test_unknown_values_are_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[(ENV_LLM_BACKEND, "bard")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(ENV_FETCH_POLICY, "maybe")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[(ENV_LLM_TIMEOUT_SECS, "soon")])).is_err());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(AppConfig::builder().symbols(Vec::<String>::new()).build().is_err());
        assert!(AppConfig::builder().llm_base_url("localhost").build().is_err());
        assert!(AppConfig::builder().llm_model("  ").build().is_err());
        assert!(AppConfig::builder().max_retries(0).build().is_err());
        assert!(AppConfig::builder().temperature(3.5).build().is_err());
    }

    #[test]
    fn test_summary_redacts_credentials() {
        let config = AppConfig::builder()
            .provider(DataProvider::Longbridge)
            .credentials(LongbridgeCredentials {
                app_key: "k".to_string(),
                app_secret: "very-secret".to_string(),
                access_token: "t".to_string(),
            })
            .build()
            .unwrap();

        let summary = serde_json::to_string(&config.summary()).unwrap();
        assert!(summary.contains("\"has_credentials\":true"));
        assert!(!summary.contains("very-secret"));
        assert!(!format!("{config:?}").contains("very-secret"));
    }
}
