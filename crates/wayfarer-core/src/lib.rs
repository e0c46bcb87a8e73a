//! Agent loop orchestration and conversation management for Wayfarer.

mod agent;
mod conversation;

pub use agent::{Agent, AgentEvent, DEFAULT_MAX_TOOL_LOOPS, DEFAULT_SYSTEM_PROMPT};
pub use conversation::Conversation;
