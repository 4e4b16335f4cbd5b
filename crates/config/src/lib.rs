//! Configuration loading, validation, and management for ragent.
//!
//! Loads configuration from `~/.ragent/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ragent/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default model provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Agent loop configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Session store configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Built-in tool configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-2.5-flash".into()
}
fn default_temperature() -> f32 {
    0.7
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("providers", &self.providers)
            .field("gateway", &self.gateway)
            .field("agent", &self.agent)
            .field("session", &self.session)
            .field("retrieval", &self.retrieval)
            .field("tools", &self.tools)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("default_model", &self.default_model)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Maximum accepted request body size
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_port() -> u16 {
    4000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model re-invocations allowed after tool execution, per turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Deadline for a whole turn, all iterations included. 0 disables it.
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,

    /// Fixed system instruction placed at the top of every prompt
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// History entries longer than this are truncated in prompts
    #[serde(default = "default_history_char_limit")]
    pub history_char_limit: usize,
}

fn default_max_iterations() -> u32 {
    5
}
fn default_turn_timeout() -> u64 {
    120
}
fn default_system_prompt() -> String {
    "You are a helpful and respectful AI assistant designed to answer user queries.".into()
}
fn default_history_char_limit() -> usize {
    300
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            turn_timeout_secs: default_turn_timeout(),
            system_prompt: default_system_prompt(),
            history_char_limit: default_history_char_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Events kept per session (oldest evicted first)
    #[serde(default = "default_session_capacity")]
    pub capacity: usize,

    /// Where to export sessions on shutdown and restore them on startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

fn default_session_capacity() -> usize {
    10
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: default_session_capacity(),
            snapshot_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// "none", "memory" or "http"
    #[serde(default = "default_retrieval_backend")]
    pub backend: String,

    /// Search endpoint for the "http" backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Documents fetched per message
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Inline documents for the "memory" backend
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<String>,

    /// Text file for the "memory" backend, one document per line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documents_path: Option<PathBuf>,
}

fn default_retrieval_backend() -> String {
    "none".into()
}
fn default_top_k() -> usize {
    3
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            backend: default_retrieval_backend(),
            url: None,
            top_k: default_top_k(),
            documents: Vec::new(),
            documents_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_weather_api_url")]
    pub weather_api_url: String,

    #[serde(default = "default_geocoding_api_url")]
    pub geocoding_api_url: String,

    /// Per-request timeout for tool HTTP calls
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_weather_api_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn default_geocoding_api_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".into()
}
fn default_http_timeout() -> u64 {
    10
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            weather_api_url: default_weather_api_url(),
            geocoding_api_url: default_geocoding_api_url(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ragent/config.toml).
    ///
    /// Also checks environment variables:
    /// - `RAGENT_API_KEY`, `GOOGLE_AI_API_KEY`, `OPENAI_API_KEY` (in that order)
    /// - `RAGENT_PROVIDER`, `RAGENT_MODEL`
    /// - `PORT`, `WEATHER_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            self.api_key = lookup("RAGENT_API_KEY")
                .or_else(|| lookup("GOOGLE_AI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(provider) = lookup("RAGENT_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("RAGENT_MODEL") {
            self.default_model = model;
        }

        if let Some(port) = lookup("PORT") {
            self.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("PORT must be a port number, got {port:?}"))
            })?;
        }

        if let Some(url) = lookup("WEATHER_API_URL") {
            self.tools.weather_api_url = url;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ragent")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        if self.agent.history_char_limit == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_char_limit must be at least 1".into(),
            ));
        }

        if self.session.capacity == 0 {
            return Err(ConfigError::ValidationError(
                "session.capacity must be at least 1".into(),
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".into(),
            ));
        }

        match self.retrieval.backend.as_str() {
            "none" | "memory" => {}
            "http" if self.retrieval.url.is_some() => {}
            "http" => {
                return Err(ConfigError::ValidationError(
                    "retrieval.url is required for the http backend".into(),
                ));
            }
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "unknown retrieval.backend {other:?} (expected none, memory or http)"
                )));
            }
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
            || self
                .providers
                .get(&self.default_provider)
                .is_some_and(|p| p.api_key.is_some())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            providers: HashMap::new(),
            gateway: GatewayConfig::default(),
            agent: AgentConfig::default(),
            session: SessionConfig::default(),
            retrieval: RetrievalConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
