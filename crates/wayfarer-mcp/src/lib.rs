//! Client for tool servers speaking MCP (Model Context Protocol) over stdio.
//!
//! The server is spawned as a child process and exchanges newline-delimited
//! JSON-RPC 2.0 messages with us. After the initialize handshake its tools
//! are discovered once and wrapped as [`McpTool`]s for the registry.

pub mod client;
pub mod config;
pub mod error;
pub mod jsonrpc;
pub mod tool;
pub mod transport;

pub use client::{McpClient, ServerInfo, SharedClient};
pub use config::McpServerConfig;
pub use error::McpError;
pub use tool::McpTool;
pub use transport::StdioTransport;
