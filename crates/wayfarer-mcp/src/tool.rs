//! McpTool: a remote tool with a validated argument contract.

use crate::client::SharedClient;
use std::sync::Arc;
use wayfarer_types::{ToolArguments, ToolDefinition, ToolError};

/// One tool exposed by the tool server.
///
/// Required arguments are checked locally before anything is sent, so a
/// malformed call never costs a round-trip.
pub struct McpTool {
    definition: ToolDefinition,
    client: SharedClient,
}

impl McpTool {
    pub fn new(definition: ToolDefinition, client: SharedClient) -> Self {
        Self { definition, client }
    }

    /// Wrap every discovered definition around the same client handle.
    pub fn wrap_all(definitions: Vec<ToolDefinition>, client: &SharedClient) -> Vec<Self> {
        definitions
            .into_iter()
            .map(|def| Self::new(def, Arc::clone(client)))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    /// Validate `arguments`, then forward them to the server.
    ///
    /// The returned text is whatever the server produced, including error
    /// text from a failed call.
    pub async fn invoke(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        self.definition.validate(&arguments)?;
        let mut client = self.client.lock().await;
        Ok(client.call_tool(&self.definition.name, &arguments).await)
    }
}
