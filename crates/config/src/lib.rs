//! Configuration loading, validation, and management for Sentinel.
//!
//! Loads configuration from `~/.sentinel/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.sentinel/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Model provider API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model provider settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Flow engine limits
    #[serde(default)]
    pub flows: FlowsConfig,

    /// Default farm location
    #[serde(default)]
    pub farm: FarmConfig,

    /// Gateway configuration
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("flows", &self.flows)
            .field("farm", &self.farm)
            .field("gateway", &self.gateway)
            .finish()
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Provider backend ("gemini")
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the provider API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model for text and structured generation
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Model for speech synthesis
    #[serde(default = "default_tts_model")]
    pub tts_model: String,

    /// Prebuilt voice for speech synthesis
    #[serde(default = "default_voice")]
    pub voice: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// HTTP timeout for one provider call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "gemini".into()
}
fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_tts_model() -> String {
    "gemini-2.5-flash-preview-tts".into()
}
fn default_voice() -> String {
    "Algenib".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_url: default_api_url(),
            default_model: default_model(),
            tts_model: default_tts_model(),
            voice: default_voice(),
            temperature: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowsConfig {
    /// Model rounds allowed per generation before giving up
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Maximum nesting of flows calling flows
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_tool_rounds() -> u32 {
    5
}

fn default_max_depth() -> usize {
    8
}

impl Default for FlowsConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: default_max_tool_rounds(),
            max_depth: default_max_depth(),
        }
    }
}

/// Where the farm is; used when a command does not name a location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmConfig {
    #[serde(default = "default_latitude")]
    pub latitude: f64,

    #[serde(default = "default_longitude")]
    pub longitude: f64,
}

// Fresno, CA
fn default_latitude() -> f64 {
    36.7783
}
fn default_longitude() -> f64 {
    -119.4179
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            latitude: default_latitude(),
            longitude: default_longitude(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,
}

fn default_port() -> u16 {
    42617
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
        }
    }
}

impl AppConfig {
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

    /// Apply environment overrides through `lookup`.
    ///
    /// An API key in the environment wins over the config file.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let env_key = ["SENTINEL_API_KEY", "GEMINI_API_KEY", "GOOGLE_API_KEY"]
            .into_iter()
            .find_map(|name| lookup(name).filter(|v| !v.is_empty()));
        if env_key.is_some() {
            self.api_key = env_key;
        }

        if let Some(model) = lookup("SENTINEL_MODEL") {
            self.model.default_model = model;
        }

        if let Some(model) = lookup("SENTINEL_TTS_MODEL") {
            self.model.tts_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".sentinel")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(t) = self.model.temperature {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::ValidationError(
                    "model.temperature must be between 0.0 and 2.0".into(),
                ));
            }
        }

        if self.model.timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "model.timeout_secs must be > 0".into(),
            ));
        }

        if self.flows.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "flows.max_tool_rounds must be >= 1".into(),
            ));
        }

        if self.flows.max_depth == 0 {
            return Err(ConfigError::ValidationError(
                "flows.max_depth must be >= 1".into(),
            ));
        }

        if !(-90.0..=90.0).contains(&self.farm.latitude) {
            return Err(ConfigError::ValidationError(
                "farm.latitude must be between -90 and 90".into(),
            ));
        }

        if !(-180.0..=180.0).contains(&self.farm.longitude) {
            return Err(ConfigError::ValidationError(
                "farm.longitude must be between -180 and 180".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
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
            model: ModelConfig::default(),
            flows: FlowsConfig::default(),
            farm: FarmConfig::default(),
            gateway: GatewayConfig::default(),
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
