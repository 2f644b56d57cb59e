//! Configuration settings for dbchat.

use crate::agent::{DEFAULT_MAX_OUTPUT_TOKENS, DEFAULT_MAX_ROUNDS, DEFAULT_SYSTEM_PROMPT};
use crate::error::{DbChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub model: ModelSettings,
    pub agent: AgentSettings,
    pub tool_server: ToolServerSettings,
    pub database: DatabaseSettings,
    pub server: ServerSettings,
}

/// Reasoning engine provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Anthropic Messages API (default).
    #[default]
    Anthropic,
    /// OpenAI Chat Completions.
    OpenAi,
}

impl ModelProvider {
    /// Model used when none is configured.
    pub fn default_model(&self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "claude-3-7-sonnet-latest",
            ModelProvider::OpenAi => "gpt-4o",
        }
    }

    /// Environment variable holding the API key when none is configured.
    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "ANTHROPIC_API_KEY",
            ModelProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(ModelProvider::Anthropic),
            "openai" => Ok(ModelProvider::OpenAi),
            _ => Err(format!("Unknown model provider: {}", s)),
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelProvider::Anthropic => write!(f, "anthropic"),
            ModelProvider::OpenAi => write!(f, "openai"),
        }
    }
}

/// Reasoning engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub provider: ModelProvider,
    /// Model name. None = provider default.
    pub model: Option<String>,
    /// Output token budget per round.
    pub max_output_tokens: u32,
    /// HTTP timeout for one model call, in seconds.
    pub timeout_secs: u64,
    /// Environment variable holding the API key. None = provider default.
    pub api_key_env: Option<String>,
    /// Custom API base URL (proxies, gateways).
    pub base_url: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            provider: ModelProvider::Anthropic,
            model: None,
            max_output_tokens: DEFAULT_MAX_OUTPUT_TOKENS,
            timeout_secs: 300,
            api_key_env: None,
            base_url: None,
        }
    }
}

impl ModelSettings {
    /// Configured model, or the provider default.
    pub fn model_name(&self) -> &str {
        self.model
            .as_deref()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Name of the environment variable holding the API key.
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.provider.default_api_key_env())
    }

    /// Read the API key from the environment.
    pub fn api_key(&self) -> Result<String> {
        let var = self.api_key_env();
        match std::env::var(var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(DbChatError::Config(format!("{} is not set", var))),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Orchestration loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum model rounds per query.
    pub max_rounds: usize,
    /// Timeout for one tool call, in seconds. 0 disables it.
    pub tool_timeout_secs: u64,
    pub system_prompt: String,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_timeout_secs: 60,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl AgentSettings {
    pub fn tool_timeout(&self) -> Option<Duration> {
        (self.tool_timeout_secs > 0).then(|| Duration::from_secs(self.tool_timeout_secs))
    }
}

/// Tool server process settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolServerSettings {
    /// Command to launch. None = this binary's own `mcp` subcommand.
    pub command: Option<String>,
    /// Arguments for `command`.
    pub args: Vec<String>,
    /// Timeout for the initialize handshake, in seconds.
    pub handshake_timeout_secs: u64,
}

impl Default for ToolServerSettings {
    fn default() -> Self {
        Self {
            command: None,
            args: Vec::new(),
            handshake_timeout_secs: 30,
        }
    }
}

impl ToolServerSettings {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }
}

/// SQLite database settings for the built-in tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Path to the SQLite file.
    pub path: String,
    /// Open the database read-only.
    pub read_only: bool,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: "database.db".to_string(),
            read_only: false,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Settings::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_rounds == 0 {
            return Err(DbChatError::Config(
                "agent.max_rounds must be at least 1".to_string(),
            ));
        }
        if self.model.max_output_tokens == 0 {
            return Err(DbChatError::Config(
                "model.max_output_tokens must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| DbChatError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dbchat")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded SQLite database path.
    pub fn database_path(&self) -> PathBuf {
        Self::expand_path(&self.database.path)
    }
}
