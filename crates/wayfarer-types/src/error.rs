//! Error hierarchy for Wayfarer.

use thiserror::Error;

/// Top-level error type for all Wayfarer operations.
#[derive(Debug, Error)]
pub enum WayfarerError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Tool loop exceeded: model kept requesting tools after {rounds} rounds")]
    ToolLoopExceeded { rounds: usize },
}

/// Errors from the language-model API.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    #[error("Bad request: {message}")]
    BadRequest { message: String },

    #[error("Rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Server overloaded")]
    Overloaded,

    #[error("Server error: {status} {message}")]
    Server { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Response parse error: {0}")]
    ResponseParse(String),

    #[error("Request timeout")]
    Timeout,
}

/// Errors from tool registration and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Tool '{name}' is already registered")]
    DuplicateName { name: String },

    #[error("Missing required arguments for tool '{tool}': {}", missing.join(", "))]
    MissingArguments { tool: String, missing: Vec<String> },

    #[error("Invalid input for tool '{tool}': {message}")]
    InvalidInput { tool: String, message: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),
}

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file parse error at {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Missing required configuration: {key}")]
    MissingKey { key: String },

    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}
