//! Tool-server client: one connection, strictly one request at a time.
//!
//! Handles the handshake (initialize + initialized notification), tool
//! discovery (tools/list), and tool invocation (tools/call).

use crate::config::McpServerConfig;
use crate::error::McpError;
use crate::jsonrpc::{JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, is_server_message};
use crate::transport::StdioTransport;
use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use wayfarer_types::{ToolArguments, ToolDefinition};

/// Protocol version we announce in `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Client name announced in `initialize`.
const CLIENT_NAME: &str = "wayfarer";

/// Handle shared by every remote tool of one server.
///
/// The mutex is what keeps at most one request in flight.
pub type SharedClient = Arc<Mutex<McpClient>>;

/// Identity the server reported during the handshake.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Deserialize)]
struct InitializeResult {
    #[serde(default, rename = "protocolVersion")]
    protocol_version: Option<String>,
    #[serde(default, rename = "serverInfo")]
    server_info: Option<ServerInfo>,
}

#[derive(Deserialize)]
struct ToolsListResult {
    #[serde(default)]
    tools: Vec<ToolEntry>,
}

#[derive(Deserialize)]
struct ToolEntry {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default, rename = "inputSchema")]
    input_schema: serde_json::Value,
}

#[derive(Deserialize)]
struct ToolCallResult {
    #[serde(default)]
    content: Vec<ContentItem>,
    #[serde(default, rename = "isError")]
    is_error: bool,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

/// Client for a single stdio tool server.
pub struct McpClient {
    name: String,
    transport: StdioTransport,
    next_id: u64,
    /// Id of the request currently awaiting its response.
    pending: Option<u64>,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Wrap a transport. The process is not started.
    pub fn new(name: impl Into<String>, transport: StdioTransport) -> Self {
        Self {
            name: name.into(),
            transport,
            next_id: 1,
            pending: None,
            server_info: None,
        }
    }

    /// Spawn the server, perform the handshake and discover its tools.
    ///
    /// On any failure the process is stopped and the error carries the
    /// server's recent stderr output.
    pub async fn connect(
        name: impl Into<String>,
        config: &McpServerConfig,
    ) -> Result<(Self, Vec<ToolDefinition>), McpError> {
        let mut client = Self::new(name, StdioTransport::new(config));

        match client.handshake().await {
            Ok(tools) => {
                tracing::info!(
                    "tool server '{}' connected with {} tools",
                    client.name,
                    tools.len()
                );
                Ok((client, tools))
            }
            Err(source) => {
                // Give a crashing server a moment to flush its stderr
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                let stderr = client.stderr_tail();
                client.shutdown().await;
                Err(McpError::Startup {
                    server: client.name,
                    source: Box::new(source),
                    stderr,
                })
            }
        }
    }

    /// Start the server process.
    pub fn start(&mut self) -> Result<(), McpError> {
        self.transport.start()
    }

    async fn handshake(&mut self) -> Result<Vec<ToolDefinition>, McpError> {
        self.start()?;
        self.initialize().await?;
        self.list_tools().await
    }

    /// Perform the `initialize` handshake, then send `notifications/initialized`.
    pub async fn initialize(&mut self) -> Result<ServerInfo, McpError> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let resp = self.request("initialize", Some(params)).await?;
        let result = self.take_result("initialize", resp)?;
        let init: InitializeResult = serde_json::from_value(result).map_err(|e| {
            McpError::Protocol(format!("Failed to parse initialize response: {e}"))
        })?;

        if let Some(version) = init.protocol_version.as_deref() {
            if version != PROTOCOL_VERSION {
                tracing::warn!(
                    "tool server '{}' speaks protocol {version}, we asked for {PROTOCOL_VERSION}",
                    self.name
                );
            }
        }

        let info = init.server_info.unwrap_or_default();
        tracing::info!(
            "tool server '{}' initialized ({} {})",
            self.name,
            info.name,
            info.version
        );

        self.notify("notifications/initialized", None).await?;
        self.server_info = Some(info.clone());
        Ok(info)
    }

    /// Discover the server's tools via `tools/list`.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDefinition>, McpError> {
        self.ensure_initialized()?;

        let resp = self
            .request("tools/list", Some(serde_json::json!({})))
            .await?;
        let result = self.take_result("tools/list", resp)?;
        let list: ToolsListResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/list response: {e}")))?;

        let mut seen = HashSet::new();
        let mut tools = Vec::with_capacity(list.tools.len());
        for entry in list.tools {
            if !seen.insert(entry.name.clone()) {
                return Err(McpError::DuplicateTool { name: entry.name });
            }
            tools.push(ToolDefinition::from_input_schema(
                entry.name,
                entry.description.unwrap_or_default(),
                &entry.input_schema,
            ));
        }

        for tool in &tools {
            tracing::debug!("tool server '{}' offers '{}'", self.name, tool.name);
        }
        Ok(tools)
    }

    /// Call a tool and return its text.
    ///
    /// Never fails: protocol errors, transport failures and malformed results
    /// all come back as error text so the conversation can carry on.
    pub async fn call_tool(&mut self, tool_name: &str, arguments: &ToolArguments) -> String {
        match self.try_call_tool(tool_name, arguments).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!("tool '{tool_name}' on '{}' failed: {e}", self.name);
                describe_call_failure(tool_name, &e)
            }
        }
    }

    async fn try_call_tool(
        &mut self,
        tool_name: &str,
        arguments: &ToolArguments,
    ) -> Result<String, McpError> {
        self.ensure_initialized()?;

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });
        let resp = self.request("tools/call", Some(params)).await?;
        let result = self.take_result("tools/call", resp)?;
        let call: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Failed to parse tools/call result: {e}")))?;

        if call.is_error {
            tracing::debug!("tool '{tool_name}' reported isError");
        }

        let first = call
            .content
            .into_iter()
            .next()
            .ok_or_else(|| McpError::Protocol("tools/call result has empty content".into()))?;
        first.text.ok_or_else(|| {
            McpError::Protocol(format!(
                "first content item is not text (type {})",
                first.kind.as_deref().unwrap_or("missing")
            ))
        })
    }

    /// Send a request and wait for the response carrying its id.
    ///
    /// Lines that are not JSON-RPC responses, server-initiated messages, and
    /// responses to other ids are logged and skipped. An error response with
    /// a null id is taken as the answer to the pending request.
    async fn request(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<JsonRpcResponse, McpError> {
        let id = self.next_id;
        self.next_id += 1;

        self.transport
            .write_line(&JsonRpcRequest::new(id, method, params))
            .await?;
        self.pending = Some(id);
        let outcome = self.await_response(id, method).await;
        self.pending = None;
        outcome
    }

    async fn await_response(&mut self, id: u64, method: &str) -> Result<JsonRpcResponse, McpError> {
        loop {
            let value = match self.transport.read_line().await {
                Ok(Some(value)) => value,
                Ok(None) => {
                    return Err(McpError::NoResponse {
                        method: method.to_string(),
                    });
                }
                Err(McpError::Decode { line, .. }) => {
                    tracing::warn!("skipping non-JSON output from '{}': {line}", self.name);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if is_server_message(&value) {
                tracing::debug!("ignoring server-initiated message from '{}'", self.name);
                continue;
            }

            let resp: JsonRpcResponse = match serde_json::from_value(value.clone()) {
                Ok(resp) if value.is_object() => resp,
                _ => {
                    tracing::warn!("skipping non-response output from '{}': {value}", self.name);
                    continue;
                }
            };
            if resp.answers(id) {
                return Ok(resp);
            }
            if resp.is_unattributed_error() {
                tracing::warn!(
                    "'{}' sent an error with a null id while {id} was pending; taking it as the answer",
                    self.name
                );
                return Ok(resp);
            }
            tracing::warn!(
                "discarding response with id {:?} from '{}' while waiting for {id}",
                resp.id,
                self.name
            );
        }
    }

    async fn notify(
        &mut self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        self.transport
            .write_line(&JsonRpcNotification::new(method, params))
            .await
    }

    /// Unwrap the `result` of a response, classifying each failure shape.
    fn take_result(
        &self,
        method: &str,
        resp: JsonRpcResponse,
    ) -> Result<serde_json::Value, McpError> {
        if let Some(err) = resp.error {
            return Err(McpError::JsonRpc {
                server: self.name.clone(),
                code: err.code,
                message: err.message,
            });
        }
        match resp.result {
            None => Err(McpError::MissingResult {
                method: method.to_string(),
            }),
            Some(serde_json::Value::Null) => Err(McpError::NullResult {
                method: method.to_string(),
            }),
            Some(result) => Ok(result),
        }
    }

    fn ensure_initialized(&self) -> Result<(), McpError> {
        if self.server_info.is_some() {
            Ok(())
        } else {
            Err(McpError::NotInitialized {
                name: self.name.clone(),
            })
        }
    }

    /// Identity reported by the server, once initialized.
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    /// Id of the request currently in flight, if any.
    pub fn pending_request(&self) -> Option<u64> {
        self.pending
    }

    /// Recent stderr output of the server.
    pub fn stderr_tail(&self) -> Vec<String> {
        self.transport.stderr_tail()
    }

    /// Stop the server process. Safe to call repeatedly.
    pub async fn shutdown(&mut self) {
        self.transport.stop().await;
        self.server_info = None;
    }

    /// Move this client into a handle shareable by remote tools.
    pub fn into_shared(self) -> SharedClient {
        Arc::new(Mutex::new(self))
    }
}

/// Render a failed `tools/call` as text for the conversation.
fn describe_call_failure(tool_name: &str, err: &McpError) -> String {
    match err {
        McpError::JsonRpc { message, .. } => {
            format!("Error calling tool '{tool_name}': {message}")
        }
        McpError::NoResponse { .. } => "Error: No response from tool server".to_string(),
        McpError::MissingResult { .. } => {
            "Error: Invalid response from tool server (missing result)".to_string()
        }
        McpError::NullResult { .. } => {
            "Error: Invalid response from tool server (null result)".to_string()
        }
        McpError::Protocol(msg) => format!("Error: Invalid response from tool server ({msg})"),
        McpError::NotRunning { .. } | McpError::NotInitialized { .. } => {
            format!("Error: Tool server unavailable: {err}")
        }
        other => format!("Error: Tool server communication failed: {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_tool_entry() {
        let json = r#"{
            "name": "get_weather",
            "description": "Get the forecast",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "location": {"type": "string"}
                },
                "required": ["location"]
            }
        }"#;
        let entry: ToolEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.name, "get_weather");
        assert_eq!(entry.description.as_deref(), Some("Get the forecast"));
        assert_eq!(entry.input_schema["required"][0], "location");
    }

    #[test]
    fn deserialize_tool_entry_without_schema() {
        let entry: ToolEntry = serde_json::from_str(r#"{"name": "ping"}"#).unwrap();
        assert!(entry.description.is_none());
        assert!(entry.input_schema.is_null());
    }

    #[test]
    fn tools_list_without_tools_key_is_empty() {
        let list: ToolsListResult = serde_json::from_str("{}").unwrap();
        assert!(list.tools.is_empty());
    }

    #[test]
    fn deserialize_call_result_without_type() {
        let result: ToolCallResult =
            serde_json::from_str(r#"{"content": [{"text": "sunny"}]}"#).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.content[0].text.as_deref(), Some("sunny"));
        assert!(result.content[0].kind.is_none());
    }

    #[test]
    fn deserialize_call_result_image() {
        let result: ToolCallResult = serde_json::from_str(
            r#"{"content": [{"type": "image", "data": "xx", "mimeType": "image/png"}], "isError": true}"#,
        )
        .unwrap();
        assert!(result.is_error);
        assert!(result.content[0].text.is_none());
        assert_eq!(result.content[0].kind.as_deref(), Some("image"));
    }

    #[test]
    fn failure_text_contains_server_message() {
        let err = McpError::JsonRpc {
            server: "travel".into(),
            code: -32602,
            message: "Unknown city".into(),
        };
        let text = describe_call_failure("get_weather", &err);
        assert_eq!(text, "Error calling tool 'get_weather': Unknown city");
    }

    #[test]
    fn failure_texts_are_distinct() {
        let texts: HashSet<String> = [
            McpError::NoResponse {
                method: "tools/call".into(),
            },
            McpError::MissingResult {
                method: "tools/call".into(),
            },
            McpError::NullResult {
                method: "tools/call".into(),
            },
            McpError::Protocol("tools/call result has empty content".into()),
        ]
        .iter()
        .map(|e| describe_call_failure("t", e))
        .collect();
        assert_eq!(texts.len(), 4);
    }

    #[tokio::test]
    async fn call_before_initialize_is_error_text() {
        let config = McpServerConfig::new("cat", vec![]);
        let mut client = McpClient::new("travel", StdioTransport::new(&config));
        let text = client.call_tool("get_weather", &ToolArguments::new()).await;
        assert!(text.starts_with("Error"), "{text}");
        assert!(text.contains("initialize"), "{text}");
    }

    #[tokio::test]
    async fn list_tools_before_initialize_fails() {
        let config = McpServerConfig::new("cat", vec![]);
        let mut client = McpClient::new("travel", StdioTransport::new(&config));
        assert!(matches!(
            client.list_tools().await,
            Err(McpError::NotInitialized { .. })
        ));
    }
}
