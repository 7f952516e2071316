//! Configuration management for chatroute
//!
//! Parses TOML configuration files and provides typed access to settings.
//! Every section is optional; omitted values fall back to the hosted defaults
//! (Groq for chat completions, Tavily for search).
//!
//! Credentials are never read from the file. The file only names the
//! environment variables that hold them, see [`ApiKey`].

use crate::error::{AppError, AppResult};
use crate::router::RouterPrompt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Upper bound for every timeout setting, in seconds
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Upper bound for `search.max_results`
const MAX_SEARCH_RESULTS: usize = 20;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Upper bound for one buffered `/chat` turn
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8501
}

fn default_request_timeout() -> u64 {
    60
}

/// Chat-completion provider settings
///
/// Fields are private so validated values cannot be mutated after
/// `Config::validate()` has run. Use the accessors.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    #[serde(default = "default_model")]
    model: String,
    /// OpenAI-compatible base URL; `/chat/completions` is appended
    #[serde(default = "default_llm_base_url")]
    base_url: String,
    #[serde(default = "default_temperature")]
    temperature: f64,
    #[serde(default = "default_llm_timeout")]
    timeout_seconds: u64,
    #[serde(default = "default_llm_key_env")]
    api_key_env: String,
    #[serde(default = "default_llm_key_placeholder")]
    api_key_placeholder: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            base_url: default_llm_base_url(),
            temperature: default_temperature(),
            timeout_seconds: default_llm_timeout(),
            api_key_env: default_llm_key_env(),
            api_key_placeholder: default_llm_key_placeholder(),
        }
    }
}

impl LlmConfig {
    /// Model identifier sent with every completion request
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Name of the environment variable holding the API key
    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    /// Template value that counts as "not configured"
    pub fn api_key_placeholder(&self) -> &str {
        &self.api_key_placeholder
    }

    /// Point the client at a different base URL (used by tests and local proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_llm_timeout() -> u64 {
    60
}

fn default_llm_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_llm_key_placeholder() -> String {
    "your_groq_api_key_here".to_string()
}

/// Web search provider settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_base_url")]
    base_url: String,
    /// Result count requested per search (k)
    #[serde(default = "default_max_results")]
    max_results: usize,
    #[serde(default = "default_search_timeout")]
    timeout_seconds: u64,
    #[serde(default = "default_search_key_env")]
    api_key_env: String,
    #[serde(default = "default_search_key_placeholder")]
    api_key_placeholder: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: default_search_base_url(),
            max_results: default_max_results(),
            timeout_seconds: default_search_timeout(),
            api_key_env: default_search_key_env(),
            api_key_placeholder: default_search_key_placeholder(),
        }
    }
}

impl SearchConfig {
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    pub fn api_key_env(&self) -> &str {
        &self.api_key_env
    }

    pub fn api_key_placeholder(&self) -> &str {
        &self.api_key_placeholder
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn default_search_base_url() -> String {
    "https://api.tavily.com".to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_search_timeout() -> u64 {
    10
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_search_key_placeholder() -> String {
    "your_tavily_api_key_here".to_string()
}

/// Routing configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RoutingConfig {
    /// Which classification prompt the router sends ("detailed" or "terse")
    #[serde(default)]
    pub prompt: RouterPrompt,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// A validated provider credential
///
/// `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Resolve a credential through an arbitrary lookup function
    ///
    /// Fails when the variable is absent, empty, or still equal to `placeholder`.
    pub fn resolve<F>(var: &str, placeholder: &str, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = lookup(var).map(|v| v.trim().to_string()).unwrap_or_default();

        if value.is_empty() {
            return Err(AppError::MissingCredential {
                var: var.to_string(),
            });
        }
        if value == placeholder {
            return Err(AppError::PlaceholderCredential {
                var: var.to_string(),
            });
        }

        Ok(Self(value))
    }

    /// Expose the secret for an Authorization header
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        let config: Self = toml::from_str(&content).map_err(|source| {
            AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            }
        })?;

        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate configuration after parsing
    ///
    /// Called by `from_file()` and `from_str()`; call it explicitly when a
    /// `Config` is assembled in code.
    pub fn validate(&self) -> AppResult<()> {
        if self.llm.model.trim().is_empty() {
            return Err(AppError::Config("llm.model cannot be empty".to_string()));
        }

        for (field, url) in [
            ("llm.base_url", &self.llm.base_url),
            ("search.base_url", &self.search.base_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(AppError::Config(format!(
                    "{} '{}' must start with 'http://' or 'https://'",
                    field, url
                )));
            }
        }

        if !self.llm.temperature.is_finite()
            || self.llm.temperature < 0.0
            || self.llm.temperature > 2.0
        {
            return Err(AppError::Config(format!(
                "llm.temperature must be a finite number between 0.0 and 2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.search.max_results == 0 || self.search.max_results > MAX_SEARCH_RESULTS {
            return Err(AppError::Config(format!(
                "search.max_results must be between 1 and {}, got {}",
                MAX_SEARCH_RESULTS, self.search.max_results
            )));
        }

        for (field, timeout) in [
            ("server.request_timeout_seconds", self.server.request_timeout_seconds),
            ("llm.timeout_seconds", self.llm.timeout_seconds),
            ("search.timeout_seconds", self.search.timeout_seconds),
        ] {
            if timeout == 0 {
                return Err(AppError::Config(format!(
                    "{} must be greater than 0",
                    field
                )));
            }
            if timeout > MAX_TIMEOUT_SECONDS {
                return Err(AppError::Config(format!(
                    "{} cannot exceed {} seconds, got {}",
                    field, MAX_TIMEOUT_SECONDS, timeout
                )));
            }
        }

        for (field, var) in [
            ("llm.api_key_env", &self.llm.api_key_env),
            ("search.api_key_env", &self.search.api_key_env),
        ] {
            if var.trim().is_empty() {
                return Err(AppError::Config(format!("{} cannot be empty", field)));
            }
        }

        Ok(())
    }
}

impl FromStr for Config {
    type Err = AppError;

    fn from_str(toml_str: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(toml_str).map_err(|source| AppError::ConfigParseFailed {
                path: "<string>".to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> &'static str {
        r#"
[server]
host = "0.0.0.0"
port = 9000
request_timeout_seconds = 45

[llm]
model = "llama-3.1-8b-instant"
base_url = "http://localhost:11434/v1"
temperature = 0.2
timeout_seconds = 20
api_key_env = "LOCAL_LLM_KEY"
api_key_placeholder = "changeme"

[search]
base_url = "http://localhost:9200"
max_results = 3
timeout_seconds = 5

[routing]
prompt = "terse"

[observability]
log_level = "debug"
log_format = "json"
"#
    }

    #[test]
    fn test_config_from_str_parses_successfully() {
        let config: Config = full_config().parse().expect("should parse");
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.request_timeout_seconds, 45);
    }

    #[test]
    fn test_config_parses_llm_section() {
        let config: Config = full_config().parse().unwrap();
        assert_eq!(config.llm.model(), "llama-3.1-8b-instant");
        assert_eq!(config.llm.base_url(), "http://localhost:11434/v1");
        assert_eq!(config.llm.temperature(), 0.2);
        assert_eq!(config.llm.timeout_seconds(), 20);
        assert_eq!(config.llm.api_key_env(), "LOCAL_LLM_KEY");
        assert_eq!(config.llm.api_key_placeholder(), "changeme");
    }

    #[test]
    fn test_config_parses_search_routing_and_observability() {
        let config: Config = full_config().parse().unwrap();
        assert_eq!(config.search.max_results(), 3);
        assert_eq!(config.search.api_key_env(), "TAVILY_API_KEY");
        assert_eq!(config.routing.prompt, RouterPrompt::Terse);
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_empty_config_uses_hosted_defaults() {
        let config: Config = "".parse().expect("empty config should be valid");
        assert_eq!(config.llm.model(), "llama-3.3-70b-versatile");
        assert_eq!(config.llm.base_url(), "https://api.groq.com/openai/v1");
        assert_eq!(config.llm.temperature(), 0.7);
        assert_eq!(config.search.base_url(), "https://api.tavily.com");
        assert_eq!(config.search.max_results(), 5);
        assert_eq!(config.routing.prompt, RouterPrompt::Detailed);
        assert_eq!(config.observability.log_format, LogFormat::Text);
    }

    #[test]
    fn test_config_validation_temperature_out_of_range_fails() {
        let result: AppResult<Config> = "[llm]\ntemperature = 2.5".parse();
        let err = result.unwrap_err();
        assert!(err.to_string().contains("llm.temperature"));
    }

    #[test]
    fn test_config_validation_nan_temperature_fails() {
        let result: AppResult<Config> = "[llm]\ntemperature = nan".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_empty_model_fails() {
        let result: AppResult<Config> = "[llm]\nmodel = \"  \"".parse();
        assert!(result.unwrap_err().to_string().contains("llm.model"));
    }

    #[test]
    fn test_config_validation_base_url_requires_protocol() {
        let result: AppResult<Config> = "[search]\nbase_url = \"api.tavily.com\"".parse();
        assert!(result.unwrap_err().to_string().contains("search.base_url"));
    }

    #[test]
    fn test_config_validation_zero_max_results_fails() {
        let result: AppResult<Config> = "[search]\nmax_results = 0".parse();
        assert!(result.unwrap_err().to_string().contains("search.max_results"));
    }

    #[test]
    fn test_config_validation_excessive_max_results_fails() {
        let result: AppResult<Config> = "[search]\nmax_results = 21".parse();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout_fails() {
        let result: AppResult<Config> = "[server]\nrequest_timeout_seconds = 0".parse();
        assert!(result.unwrap_err().to_string().contains("greater than 0"));
    }

    #[test]
    fn test_config_validation_excessive_timeout_fails() {
        let result: AppResult<Config> = "[llm]\ntimeout_seconds = 301".parse();
        assert!(result.unwrap_err().to_string().contains("cannot exceed 300"));
    }

    #[test]
    fn test_config_rejects_unknown_router_prompt() {
        let result: AppResult<Config> = "[routing]\nprompt = \"verbose\"".parse();
        assert!(matches!(result, Err(AppError::ConfigParseFailed { .. })));
    }

    #[test]
    fn test_with_base_url_overrides() {
        let llm = LlmConfig::default().with_base_url("http://127.0.0.1:1234/v1");
        assert_eq!(llm.base_url(), "http://127.0.0.1:1234/v1");
        let search = SearchConfig::default().with_base_url("http://127.0.0.1:1235");
        assert_eq!(search.base_url(), "http://127.0.0.1:1235");
    }

    #[test]
    fn test_api_key_missing_is_config_error() {
        let err = ApiKey::resolve("GROQ_API_KEY", "your_groq_api_key_here", |_| None).unwrap_err();
        assert!(matches!(err, AppError::MissingCredential { ref var } if var == "GROQ_API_KEY"));
    }

    #[test]
    fn test_api_key_empty_counts_as_missing() {
        let err = ApiKey::resolve("GROQ_API_KEY", "placeholder", |_| Some("   ".to_string()))
            .unwrap_err();
        assert!(matches!(err, AppError::MissingCredential { .. }));
    }

    #[test]
    fn test_api_key_placeholder_is_config_error() {
        let err = ApiKey::resolve("TAVILY_API_KEY", "your_tavily_api_key_here", |_| {
            Some("your_tavily_api_key_here".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, AppError::PlaceholderCredential { .. }));
        assert!(err.is_config());
    }

    #[test]
    fn test_api_key_valid_value_resolves_and_is_redacted() {
        let key = ApiKey::resolve("GROQ_API_KEY", "your_groq_api_key_here", |name| {
            assert_eq!(name, "GROQ_API_KEY");
            Some("gsk_live_123".to_string())
        })
        .unwrap();
        assert_eq!(key.expose(), "gsk_live_123");
        assert_eq!(format!("{:?}", key), "ApiKey(***)");
    }
}
