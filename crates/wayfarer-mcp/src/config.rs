//! Configuration for the tool server process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_shutdown_timeout() -> u64 {
    5000
}

fn default_required() -> bool {
    true
}

/// How to launch the tool server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Command to run (e.g., "python", "uv").
    pub command: String,
    /// Arguments to pass to the command.
    #[serde(default)]
    pub args: Vec<String>,
    /// Environment variables to set for the server process.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Grace period before the process is killed on shutdown (default: 5000).
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_ms: u64,
    /// Abort startup if the server cannot be started (default: true).
    #[serde(default = "default_required")]
    pub required: bool,
}

impl McpServerConfig {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            shutdown_timeout_ms: default_shutdown_timeout(),
            required: default_required(),
        }
    }

    /// Short display label, e.g. `python mcp_server/main.py`.
    pub fn display_name(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
