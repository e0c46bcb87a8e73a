//! Anthropic Messages API client and provider for Wayfarer.

mod client;
mod provider;
mod wire;

pub use client::{ApiClient, RetryPolicy};
pub use provider::{AnthropicProvider, DEFAULT_MAX_TOKENS};
pub use wire::{ContentBlock, MessagesRequest, MessagesResponse, WireMessage, WireTool};
