//! Layered TOML configuration for Wayfarer.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > `~/.wayfarer/config.toml` > defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use wayfarer_mcp::McpServerConfig;
use wayfarer_types::ConfigError;

/// The default Anthropic API base URL.
pub const DEFAULT_API_BASE_URL: &str = "https://api.anthropic.com";

/// The default model to use.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

/// The default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Resolved configuration for a Wayfarer session.
#[derive(Debug, Clone)]
pub struct WayfarerConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub api_base_url: String,
    pub temperature: Option<f32>,
    pub max_tool_loops: usize,
    pub system_prompt: String,
    /// Tool server to launch, if any.
    pub mcp: Option<McpServerConfig>,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    #[serde(default)]
    pub agent: AgentSettings,
    #[serde(default)]
    pub mcp: Option<McpServerConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    pub max_tool_loops: Option<usize>,
    pub system_prompt: Option<String>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    /// Replaces the configured tool server command (and its arguments).
    pub mcp_command: Option<String>,
    pub mcp_args: Vec<String>,
    /// Run with local tools only.
    pub no_mcp: bool,
}

impl WayfarerConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables
    /// 3. Config file (~/.wayfarer/config.toml)
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::resolve(config_dir(), overrides, |key| std::env::var(key).ok())
    }

    /// Resolve against an explicit config directory and environment lookup.
    pub fn resolve<E>(
        config_dir: PathBuf,
        overrides: CliOverrides,
        env: E,
    ) -> Result<Self, ConfigError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let settings = load_settings_file(&config_dir.join("config.toml"))?;

        // Resolve API key: CLI > env > config file
        let api_key = overrides
            .api_key
            .or_else(|| env("ANTHROPIC_API_KEY"))
            .or(settings.api.api_key)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingKey {
                key: "api_key (set ANTHROPIC_API_KEY or add to ~/.wayfarer/config.toml)".into(),
            })?;

        let model = overrides
            .model
            .or_else(|| env("WAYFARER_MODEL"))
            .or(settings.api.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let max_tokens = overrides
            .max_tokens
            .or(settings.api.max_tokens)
            .unwrap_or(wayfarer_api::DEFAULT_MAX_TOKENS);
        if max_tokens == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_tokens".into(),
                message: "must be greater than zero".into(),
            });
        }

        let api_base_url = env("ANTHROPIC_API_BASE_URL")
            .or(settings.api.base_url)
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let temperature = settings.api.temperature.unwrap_or(DEFAULT_TEMPERATURE);
        if !(0.0..=1.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "temperature".into(),
                message: format!("{temperature} is outside 0.0..=1.0"),
            });
        }

        let max_tool_loops = settings
            .agent
            .max_tool_loops
            .unwrap_or(wayfarer_core::DEFAULT_MAX_TOOL_LOOPS);
        if max_tool_loops == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_tool_loops".into(),
                message: "must be at least 1".into(),
            });
        }

        let system_prompt = settings
            .agent
            .system_prompt
            .unwrap_or_else(|| wayfarer_core::DEFAULT_SYSTEM_PROMPT.to_string());

        // Tool server: --no-mcp > --mcp-command > config file
        let mcp = if overrides.no_mcp {
            None
        } else if let Some(command) = overrides.mcp_command {
            let mut server = settings.mcp.unwrap_or_else(|| McpServerConfig::new("", vec![]));
            server.command = command;
            server.args = overrides.mcp_args;
            Some(server)
        } else {
            settings.mcp
        };
        if let Some(server) = &mcp {
            if server.command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "mcp.command".into(),
                    message: "must not be empty".into(),
                });
            }
        }

        Ok(WayfarerConfig {
            api_key,
            model,
            max_tokens,
            api_base_url,
            temperature: Some(temperature),
            max_tool_loops,
            system_prompt,
            mcp,
            config_dir,
        })
    }
}

/// Get the Wayfarer config directory path (~/.wayfarer/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("WAYFARER_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wayfarer")
}

/// Load and parse a TOML settings file. A missing file yields defaults.
fn load_settings_file(path: &Path) -> Result<SettingsFile, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        }),
        Err(e) => {
            tracing::debug!("No settings at {}: {e}", path.display());
            Ok(SettingsFile::default())
        }
    }
}
