//! Error types for tool-server communication.

use thiserror::Error;

/// Errors from the transport and protocol layers.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Failed to spawn tool server '{command}': {source}")]
    SpawnFailed {
        command: String,
        source: std::io::Error,
    },

    #[error("Tool server '{name}' is not running")]
    NotRunning { name: String },

    #[error("Tool server '{name}' has not completed the initialize handshake")]
    NotInitialized { name: String },

    #[error("Malformed JSON line from tool server: {source}: {line}")]
    Decode {
        line: String,
        source: serde_json::Error,
    },

    #[error("No response from tool server to '{method}' (stream closed)")]
    NoResponse { method: String },

    #[error("Response to '{method}' has no result")]
    MissingResult { method: String },

    #[error("Response to '{method}' has a null result")]
    NullResult { method: String },

    #[error("JSON-RPC error from '{server}' (code {code}): {message}")]
    JsonRpc {
        server: String,
        code: i64,
        message: String,
    },

    #[error("Tool server reported duplicate tool name '{name}'")]
    DuplicateTool { name: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Tool server '{server}' failed to start: {source}")]
    Startup {
        server: String,
        #[source]
        source: Box<McpError>,
        /// Last lines the server wrote to stderr, for diagnostics.
        stderr: Vec<String>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
