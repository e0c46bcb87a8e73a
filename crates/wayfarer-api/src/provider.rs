//! Anthropic Messages API provider implementation.

use crate::client::{ApiClient, RetryPolicy};
use crate::wire::MessagesRequest;
use wayfarer_types::provider::{CompletionFuture, Provider};
use wayfarer_types::{ApiError, Message, ToolDefinition};

/// Default `max_tokens` for each completion.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic Messages API provider.
///
/// Wraps `ApiClient`, translating conversation history into API requests
/// and responses back into assistant messages. Retry logic stays in
/// `ApiClient`.
#[derive(Clone)]
pub struct AnthropicProvider {
    client: ApiClient,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl AnthropicProvider {
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ApiError> {
        Ok(Self {
            client: ApiClient::new(api_key, base_url)?,
            model: model.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.client = self.client.with_retry_policy(retry);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Provider for AnthropicProvider {
    fn complete<'a>(
        &'a self,
        history: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> CompletionFuture<'a> {
        Box::pin(async move {
            let request = MessagesRequest::build(
                self.model.clone(),
                self.max_tokens,
                self.temperature,
                history,
                tools,
            );
            let response = self.client.create_message(&request).await?;
            tracing::debug!(
                "{} replied (stop_reason={:?}, {} blocks)",
                self.model,
                response.stop_reason,
                response.content.len()
            );
            Ok(response.into_message())
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
