//! Engine configuration
//!
//! Loaded from TOML with defaults for every field, then overridden from the
//! environment:
//! - `WIREFORGE_API_KEY`
//! - `WIREFORGE_MODEL`
//! - `WIREFORGE_API_BASE`

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable holding the model API key
pub const ENV_API_KEY: &str = "WIREFORGE_API_KEY";
/// Environment variable overriding the model identifier
pub const ENV_MODEL: &str = "WIREFORGE_MODEL";
/// Environment variable overriding the API base URL
pub const ENV_API_BASE: &str = "WIREFORGE_API_BASE";

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for [`EngineConfig`]
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Orchestrator and model client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Model identifier
    pub model: String,
    /// OpenAI-compatible API base URL
    pub api_base: String,
    /// API key; usually supplied through the environment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Sampling temperature
    pub temperature: f32,
    /// Completion token limit
    pub max_tokens: u32,
    /// Consume model output as a stream
    pub streaming: bool,
    /// Result cache capacity
    pub cache_capacity: usize,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Origin the sandbox document posts to
    pub host_origin: String,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string
    ///
    /// # Errors
    /// Returns `ConfigError::Parse` on malformed TOML or mistyped fields
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(source)?)
    }

    /// Load a TOML file and apply environment overrides
    ///
    /// # Errors
    /// Returns `ConfigError` when the file cannot be read or parsed
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&source)?.with_env_overrides();
        tracing::debug!(path = %path.as_ref().display(), model = %config.model, "Loaded engine config");
        Ok(config)
    }

    /// Apply overrides from the process environment
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    #[must_use]
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(model) = non_empty(ENV_MODEL) {
            self.model = model;
        }
        if let Some(base) = non_empty(ENV_API_BASE) {
            self.api_base = base;
        }
        self
    }

    /// With model
    #[inline]
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// With API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// With API base URL
    #[inline]
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// With streaming mode
    #[inline]
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    /// With cache capacity
    #[inline]
    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: None,
            temperature: 0.7,
            max_tokens: 4000,
            streaming: false,
            cache_capacity: wf_cache::DEFAULT_CAPACITY,
            request_timeout_secs: 60,
            host_origin: "http://localhost".to_string(),
        }
    }
}
