//! Messages API wire format and translation to/from conversation messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use wayfarer_types::{Message, Role, ToolArguments, ToolCallRequest, ToolDefinition};

/// Request body for `POST /v1/messages`.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<WireTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// One message in API format. Role is `user` or `assistant`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

/// A content block inside a message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
    /// Block types this client does not interpret (e.g. thinking).
    #[serde(other)]
    Unknown,
}

/// Tool catalogue entry in API format.
#[derive(Debug, Clone, Serialize)]
pub struct WireTool {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

impl From<&ToolDefinition> for WireTool {
    fn from(def: &ToolDefinition) -> Self {
        Self {
            name: def.name.clone(),
            description: def.description.clone(),
            input_schema: def.input_schema(),
        }
    }
}

/// Successful response body.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessagesRequest {
    /// Translate a conversation history and tool catalogue into a request.
    ///
    /// System messages are joined into the `system` field. Tool messages
    /// become `tool_result` blocks in a user message, and consecutive
    /// messages that map to the same API role are merged, since the API
    /// requires strict user/assistant alternation.
    pub fn build(
        model: impl Into<String>,
        max_tokens: u32,
        temperature: Option<f32>,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Self {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages: Vec<WireMessage> = Vec::new();

        for msg in history {
            let (role, blocks) = match msg.role {
                Role::System => {
                    system_parts.push(&msg.content);
                    continue;
                }
                Role::User => ("user", text_block(&msg.content).into_iter().collect()),
                Role::Assistant => {
                    let mut blocks: Vec<ContentBlock> =
                        text_block(&msg.content).into_iter().collect();
                    blocks.extend(msg.tool_calls.iter().map(|call| ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: Value::Object(call.arguments.clone()),
                    }));
                    ("assistant", blocks)
                }
                Role::Tool => (
                    "user",
                    vec![ContentBlock::ToolResult {
                        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                        content: msg.content.clone(),
                    }],
                ),
            };

            if blocks.is_empty() {
                continue;
            }
            match messages.last_mut() {
                Some(last) if last.role == role => last.content.extend(blocks),
                _ => messages.push(WireMessage {
                    role: role.to_string(),
                    content: blocks,
                }),
            }
        }

        Self {
            model: model.into(),
            max_tokens,
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            messages,
            tools: tools.iter().map(WireTool::from).collect(),
            temperature,
        }
    }
}

fn text_block(text: &str) -> Option<ContentBlock> {
    (!text.is_empty()).then(|| ContentBlock::Text {
        text: text.to_string(),
    })
}

impl MessagesResponse {
    /// Convert the response into an assistant message.
    ///
    /// Text blocks are concatenated; `tool_use` blocks become tool-call
    /// requests in order.
    pub fn into_message(self) -> Message {
        let mut text = String::new();
        let mut calls = Vec::new();

        for block in self.content {
            match block {
                ContentBlock::Text { text: t } => text.push_str(&t),
                ContentBlock::ToolUse { id, name, input } => {
                    let arguments = match input {
                        Value::Object(map) => map,
                        _ => ToolArguments::new(),
                    };
                    calls.push(ToolCallRequest::new(id, name, arguments));
                }
                ContentBlock::ToolResult { .. } | ContentBlock::Unknown => {}
            }
        }

        Message::assistant_with_calls(text, calls)
    }
}
