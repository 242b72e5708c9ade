//! Configuration loading, validation, and management for Nimbus.
//!
//! Loads configuration from `~/.nimbus/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.nimbus/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the LLM provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which provider flavor to talk to: "openrouter", "openai", or "ollama"
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Override the provider's base URL (e.g. a self-hosted gateway)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per LLM response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Workspace directory the file/shell tools are fenced to.
    /// Defaults to `~/.nimbus/workspace`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspace: Option<PathBuf>,

    /// Agent loop limits
    #[serde(default)]
    pub agent: AgentConfig,

    /// Memory store settings
    #[serde(default)]
    pub memory: MemoryConfig,
}

fn default_provider() -> String {
    "openrouter".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
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
            .field("provider", &self.provider)
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("workspace", &self.workspace)
            .field("agent", &self.agent)
            .field("memory", &self.memory)
            .finish()
    }
}

/// Limits for the agent loop and delegation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Max provider round-trips per user message
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Max provider round-trips per subagent task
    #[serde(default = "default_subagent_max_iterations")]
    pub subagent_max_iterations: usize,

    /// Wall-clock deadline for a whole turn, in seconds
    #[serde(default = "default_turn_timeout_secs")]
    pub turn_timeout_secs: u64,

    /// Messages kept per session on top of the system prompt
    #[serde(default = "default_session_max_messages")]
    pub session_max_messages: usize,

    /// Rebuild the system prompt every N messages
    #[serde(default = "default_prompt_refresh_interval")]
    pub prompt_refresh_interval: usize,

    /// Character budget for memory-derived prompt sections
    #[serde(default = "default_context_budget_chars")]
    pub context_budget_chars: usize,
}

fn default_max_iterations() -> usize {
    24
}
fn default_subagent_max_iterations() -> usize {
    20
}
fn default_turn_timeout_secs() -> u64 {
    300
}
fn default_session_max_messages() -> usize {
    50
}
fn default_prompt_refresh_interval() -> usize {
    15
}
fn default_context_budget_chars() -> usize {
    6000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            subagent_max_iterations: default_subagent_max_iterations(),
            turn_timeout_secs: default_turn_timeout_secs(),
            session_max_messages: default_session_max_messages(),
            prompt_refresh_interval: default_prompt_refresh_interval(),
            context_budget_chars: default_context_budget_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Whether memory/goal stores are loaded at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for JSON store files. Defaults to `~/.nimbus/memory`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.nimbus/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `NIMBUS_API_KEY` (highest priority)
    /// - `OPENROUTER_API_KEY`
    /// - `OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;

        // Environment variable overrides (highest priority)
        if config.api_key.is_none() {
            config.api_key = std::env::var("NIMBUS_API_KEY")
                .ok()
                .or_else(|| std::env::var("OPENROUTER_API_KEY").ok())
                .or_else(|| std::env::var("OPENAI_API_KEY").ok());
        }

        if let Ok(provider) = std::env::var("NIMBUS_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("NIMBUS_MODEL") {
            config.default_model = model;
        }

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

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".nimbus")
    }

    /// The workspace directory tools are fenced to.
    pub fn workspace_dir(&self) -> PathBuf {
        self.workspace
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("workspace"))
    }

    /// The directory for memory store files.
    pub fn memory_dir(&self) -> PathBuf {
        self.memory
            .data_dir
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("memory"))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_temperature < 0.0 || self.default_temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.max_iterations == 0 || self.agent.subagent_max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "iteration limits must be at least 1".into(),
            ));
        }

        if self.agent.session_max_messages == 0 {
            return Err(ConfigError::ValidationError(
                "session_max_messages must be at least 1".into(),
            ));
        }

        match self.provider.as_str() {
            "openrouter" | "openai" | "ollama" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "unknown provider '{other}' (expected openrouter, openai, or ollama)"
            ))),
        }
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: default_provider(),
            base_url: None,
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            workspace: None,
            agent: AgentConfig::default(),
            memory: MemoryConfig::default(),
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
