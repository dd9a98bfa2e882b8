use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "cpra-review";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local Ollama instance.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Model used when nothing else is configured.
pub const DEFAULT_MODEL: &str = "gemma3:latest";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "info,cpra_review_lib=debug,reqwest=warn,hyper=warn"
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Model invocation settings.
///
/// The core treats these as opaque: they are handed to the gateway
/// (`base_url`, `model`, `temperature`, `max_tokens`, `timeout_secs`,
/// `max_request_chars`) and to the executor (`max_attempts`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    /// Sampling temperature, 0.0 to 1.0.
    pub temperature: f32,
    /// Upper bound on generated tokens (Ollama `num_predict`).
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Attempts per structured query, including the first.
    pub max_attempts: u32,
    /// Combined system + user character budget for one request.
    pub max_request_chars: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.2,
            max_tokens: 800,
            timeout_secs: 120,
            max_attempts: 3,
            max_request_chars: 200_000,
        }
    }
}

impl ModelConfig {
    /// Defaults overridden by `CPRA_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ModelConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("CPRA_OLLAMA_URL") {
            config.base_url = url;
        }
        if let Some(model) = lookup("CPRA_DEFAULT_MODEL") {
            config.model = model;
        }
        if let Some(v) = lookup("CPRA_MODEL_TEMPERATURE") {
            config.temperature = parse_env("CPRA_MODEL_TEMPERATURE", &v)?;
        }
        if let Some(v) = lookup("CPRA_MAX_TOKENS") {
            config.max_tokens = parse_env("CPRA_MAX_TOKENS", &v)?;
        }
        if let Some(v) = lookup("CPRA_TIMEOUT_SECONDS") {
            config.timeout_secs = parse_env("CPRA_TIMEOUT_SECONDS", &v)?;
        }
        if let Some(v) = lookup("CPRA_RETRY_ATTEMPTS") {
            config.max_attempts = parse_env("CPRA_RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("CPRA_MAX_REQUEST_CHARS") {
            config.max_request_chars = parse_env("CPRA_MAX_REQUEST_CHARS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} outside 0.0..=1.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be at least 1".into()));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeout_secs must be at least 1".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.max_request_chars == 0 {
            return Err(ConfigError::Invalid(
                "max_request_chars must be at least 1".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("model name is empty".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key,
        value: value.to_string(),
    })
}
