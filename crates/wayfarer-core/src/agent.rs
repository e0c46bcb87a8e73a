//! The core agent loop that orchestrates conversation with tool use.

use crate::conversation::Conversation;
use std::sync::Arc;
use wayfarer_tools::ToolRegistry;
use wayfarer_types::{Message, WayfarerError, preview, provider::Provider};

/// Maximum number of model round-trips per user turn, unless configured.
pub const DEFAULT_MAX_TOOL_LOOPS: usize = 25;

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
You are a helpful AI assistant with access to tools.

You can:
- Get the current time when needed
- Perform mathematical calculations
- Use any tools provided by the connected tool server, such as searching for flights
- and much more using your own knowledge

Always be concise and helpful. Use tools when appropriate to provide accurate information.";

/// Events emitted by the agent during execution.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// A tool is about to be executed.
    ToolStart { name: String },
    /// A tool has finished; `output` is a display preview.
    ToolEnd { name: String, output: String },
    /// The agent has produced its final answer for the turn.
    Done,
}

/// The main agent that manages conversation with the model and tool execution.
pub struct Agent {
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
    conversation: Conversation,
    max_tool_loops: usize,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            registry,
            conversation: Conversation::new(system_prompt),
            max_tool_loops: DEFAULT_MAX_TOOL_LOOPS,
        }
    }

    /// Cap on model round-trips per turn. Values below 1 are raised to 1.
    pub fn with_max_tool_loops(mut self, max: usize) -> Self {
        self.max_tool_loops = max.max(1);
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn max_tool_loops(&self) -> usize {
        self.max_tool_loops
    }

    /// Forget the conversation, keeping the system prompt.
    pub fn reset(&mut self) {
        self.conversation.reset();
    }

    /// Submit one user message and run the model loop until a final answer.
    ///
    /// Each round sends the full history plus the tool catalogue. A reply
    /// without tool calls ends the turn; otherwise every call is dispatched
    /// in order and answered with a tool message carrying the same id before
    /// the model is asked again.
    ///
    /// History is append-only: on error, whatever was appended stays, and
    /// every tool call already recorded has its result.
    pub async fn submit<F>(&mut self, text: &str, mut on_event: F) -> Result<String, WayfarerError>
    where
        F: FnMut(AgentEvent),
    {
        self.conversation.push(Message::user(text));
        let tools = self.registry.definitions();

        for round in 1..=self.max_tool_loops {
            tracing::debug!(
                "Model round {round}/{} ({} messages, {} tools)",
                self.max_tool_loops,
                self.conversation.len(),
                tools.len()
            );
            let reply = self
                .provider
                .complete(self.conversation.messages(), &tools)
                .await?;

            if !reply.has_tool_calls() {
                let answer = reply.content.clone();
                self.conversation.push(reply);
                on_event(AgentEvent::Done);
                return Ok(answer);
            }

            let calls = reply.tool_calls.clone();
            self.conversation.push(reply);

            for call in calls {
                on_event(AgentEvent::ToolStart {
                    name: call.name.clone(),
                });
                tracing::debug!(
                    "Calling {} ({}) with {}",
                    call.name,
                    call.id,
                    format_arguments(&call.arguments)
                );

                let output = self.registry.dispatch(&call.name, call.arguments).await;

                on_event(AgentEvent::ToolEnd {
                    name: call.name,
                    output: preview(&output, 200).into_owned(),
                });
                self.conversation.push(Message::tool_result(call.id, output));
            }
        }

        tracing::warn!(
            "Model still requesting tools after {} rounds",
            self.max_tool_loops
        );
        Err(WayfarerError::ToolLoopExceeded {
            rounds: self.max_tool_loops,
        })
    }
}

fn format_arguments(arguments: &wayfarer_types::ToolArguments) -> String {
    let rendered = arguments
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ");
    preview(&rendered, 200).into_owned()
}
