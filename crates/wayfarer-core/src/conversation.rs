//! Append-only conversation history.

use wayfarer_types::Message;

/// Ordered message history, always starting with one system message.
///
/// Messages are only ever appended during a session; [`Conversation::reset`]
/// is the one way back, and it keeps the system prompt.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::system(system_prompt)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Drop everything but the system prompt.
    pub fn reset(&mut self) {
        self.messages.truncate(1);
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True when nothing beyond the system prompt has been recorded.
    pub fn is_empty(&self) -> bool {
        self.messages.len() <= 1
    }
}
