//! JSON-RPC 2.0 envelopes used on the tool-server wire.

use serde::{Deserialize, Deserializer, Serialize};

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no id, no response expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: &'static str,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<serde_json::Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response.
///
/// `result` distinguishes an absent field (`None`) from an explicit
/// `"result": null` (`Some(Value::Null)`); the two are reported differently.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default, deserialize_with = "present")]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Whether this response answers request `id`.
    pub fn answers(&self, id: u64) -> bool {
        self.id.as_ref().and_then(|v| v.as_u64()) == Some(id)
    }

    /// An error the server could not tie to a request (`"id": null`, e.g.
    /// after failing to parse what it was sent). With one request in
    /// flight it can only be about that request.
    pub fn is_unattributed_error(&self) -> bool {
        self.error.is_some() && matches!(self.id, None | Some(serde_json::Value::Null))
    }
}

fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default = "unknown_error")]
    pub message: String,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

fn unknown_error() -> String {
    "Unknown error".to_string()
}

/// Whether a decoded line is server-initiated (request or notification)
/// rather than a response to us.
pub fn is_server_message(value: &serde_json::Value) -> bool {
    value.get("method").is_some()
}
