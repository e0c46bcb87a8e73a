//! Provider trait for language-model backends.

use crate::{ApiError, Message, ToolDefinition};
use std::future::Future;
use std::pin::Pin;

/// Future returned by [`Provider::complete`].
pub type CompletionFuture<'a> = Pin<Box<dyn Future<Output = Result<Message, ApiError>> + Send + 'a>>;

/// A language-model collaborator.
///
/// Takes the full ordered history plus the tool catalogue and returns one
/// assistant message: either plain text or one carrying tool-call requests.
/// Dyn-compatible so the agent works with `Arc<dyn Provider>`.
pub trait Provider: Send + Sync {
    fn complete<'a>(
        &'a self,
        history: &'a [Message],
        tools: &'a [ToolDefinition],
    ) -> CompletionFuture<'a>;

    /// Provider name for logging/display (e.g., "anthropic").
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn provider_is_dyn_compatible() {
        fn _accept(_p: &dyn Provider) {}
    }

    #[test]
    fn arc_provider_is_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Arc<dyn Provider>>();
    }
}
