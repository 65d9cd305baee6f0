//! Configuration loading, validation, and management for AgentFlux.
//!
//! Loads configuration from `~/.agentflux/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.agentflux/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response (unset = provider default)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Built-in tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "openai/gpt-oss-120b:exacto".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_true() -> bool {
    true
}

/// Redact a secret for Debug output.
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
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("agent", &self.agent)
            .field("tools", &self.tools)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// Agent loop behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// System prompt inserted at the start of every new conversation
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Stream responses (true) or request single-shot completions (false)
    #[serde(default = "default_true")]
    pub streaming: bool,

    /// Maximum model turns per run. 0 disables the cap.
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Time budget for one turn (request + full stream)
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_secs: u64,

    /// Time budget for one tool execution
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_secs: u64,
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".into()
}
fn default_max_turns() -> u32 {
    25
}
fn default_turn_timeout() -> u64 {
    300
}
fn default_tool_timeout() -> u64 {
    60
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            streaming: true,
            max_turns: default_max_turns(),
            turn_timeout_secs: default_turn_timeout(),
            tool_timeout_secs: default_tool_timeout(),
        }
    }
}

/// Built-in tool configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Tavily API key; enables `search` and `web_scraper`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tavily_api_key: Option<String>,

    #[serde(default = "default_search_max_results")]
    pub search_max_results: u32,

    /// Interpreter used by `code_interpret`
    #[serde(default = "default_python_bin")]
    pub python_bin: String,

    /// `code_interpret` runs code on the host, so it is opt-in
    #[serde(default)]
    pub enable_code_interpret: bool,
}

fn default_search_max_results() -> u32 {
    10
}
fn default_python_bin() -> String {
    "python3".into()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            tavily_api_key: None,
            search_max_results: default_search_max_results(),
            python_bin: default_python_bin(),
            enable_code_interpret: false,
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("tavily_api_key", &redact(&self.tavily_api_key))
            .field("search_max_results", &self.search_max_results)
            .field("python_bin", &self.python_bin)
            .field("enable_code_interpret", &self.enable_code_interpret)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// CORS origins. Empty = allow any origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            allowed_origins: vec![],
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.agentflux/config.toml).
    ///
    /// Environment variables override file values:
    /// - `AGENTFLUX_API_KEY`, then `OPENROUTER_API_KEY`
    /// - `AGENTFLUX_MODEL`
    /// - `AGENTFLUX_BASE_URL`
    /// - `TAVILY_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply environment overrides through the given lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("AGENTFLUX_API_KEY").or_else(|| lookup("OPENROUTER_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("AGENTFLUX_MODEL") {
            self.model = model;
        }
        if let Some(url) = lookup("AGENTFLUX_BASE_URL") {
            self.base_url = url;
        }
        if let Some(key) = lookup("TAVILY_API_KEY") {
            self.tools.tavily_api_key = Some(key);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".agentflux")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if self.agent.turn_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent timeouts must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Check if a provider API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// The config as TOML with secrets removed.
    pub fn redacted_toml(&self) -> String {
        let mut config = self.clone();
        config.api_key = config.api_key.map(|_| "[REDACTED]".into());
        config.tools.tavily_api_key = config.tools.tavily_api_key.map(|_| "[REDACTED]".into());
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: None,
            agent: AgentConfig::default(),
            tools: ToolsConfig::default(),
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.agent.streaming);
        assert_eq!(config.agent.max_turns, 25);
        assert_eq!(config.agent.system_prompt, "You are a helpful assistant.");
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.agent.tool_timeout_secs, config.agent.tool_timeout_secs);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut config = AppConfig::default();
        config.agent.tool_timeout_secs = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.base_url, "https://openrouter.ai/api/v1");
    }

    #[test]
    fn load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "test/model"

[agent]
streaming = false
max_turns = 0

[tools]
enable_code_interpret = true
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "test/model");
        assert!(!config.agent.streaming);
        assert_eq!(config.agent.max_turns, 0);
        assert_eq!(config.agent.turn_timeout_secs, 300);
        assert!(config.tools.enable_code_interpret);
        assert_eq!(config.tools.python_bin, "python3");
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let env: HashMap<&str, &str> = [
            ("OPENROUTER_API_KEY", "sk-or"),
            ("AGENTFLUX_MODEL", "env/model"),
            ("TAVILY_API_KEY", "tvly"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.api_key.as_deref(), Some("sk-or"));
        assert_eq!(config.model, "env/model");
        assert_eq!(config.tools.tavily_api_key.as_deref(), Some("tvly"));
    }

    #[test]
    fn agentflux_key_takes_priority() {
        let mut config = AppConfig::default();
        config.apply_env(|k| match k {
            "AGENTFLUX_API_KEY" => Some("primary".into()),
            "OPENROUTER_API_KEY" => Some("secondary".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("primary"));
    }

    #[test]
    fn secrets_are_redacted() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        config.tools.tavily_api_key = Some("tvly-secret".into());

        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("tvly-secret"));

        let toml_str = config.redacted_toml();
        assert!(!toml_str.contains("sk-secret"));
        assert!(toml_str.contains("[REDACTED]"));
    }
}
