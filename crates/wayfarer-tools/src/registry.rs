//! Unified registry: one name space over local and remote tools.

use std::collections::HashMap;
use std::sync::Arc;
use wayfarer_mcp::McpTool;
use wayfarer_types::{Tool, ToolArguments, ToolDefinition, ToolError};

/// A registry entry: either an in-process tool or one served remotely.
pub enum RegisteredTool {
    Local(Arc<dyn Tool>),
    Remote(McpTool),
}

impl RegisteredTool {
    pub fn name(&self) -> &str {
        match self {
            Self::Local(tool) => tool.name(),
            Self::Remote(tool) => tool.name(),
        }
    }

    pub fn definition(&self) -> ToolDefinition {
        match self {
            Self::Local(tool) => tool.definition(),
            Self::Remote(tool) => tool.definition().clone(),
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }

    /// Run the tool. Required arguments are checked first for both kinds.
    pub async fn invoke(&self, arguments: ToolArguments) -> Result<String, ToolError> {
        match self {
            Self::Local(tool) => {
                tool.definition().validate(&arguments)?;
                tool.execute(arguments).await
            }
            Self::Remote(tool) => tool.invoke(arguments).await,
        }
    }
}

/// Registry of available tools, supporting name-based dispatch.
///
/// Built once at startup; names are unique across local and remote tools and
/// a clash is an error rather than a silent override.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from local tools followed by remote ones.
    pub fn build(local: Vec<Arc<dyn Tool>>, remote: Vec<McpTool>) -> Result<Self, ToolError> {
        let mut registry = Self::new();
        for tool in local {
            registry.register(RegisteredTool::Local(tool))?;
        }
        for tool in remote {
            registry.register(RegisteredTool::Remote(tool))?;
        }
        tracing::debug!(
            "tool registry built: {} local, {} remote",
            registry.tools.iter().filter(|t| !t.is_remote()).count(),
            registry.tools.iter().filter(|t| t.is_remote()).count()
        );
        Ok(registry)
    }

    /// Register a tool. Fails if the name is already taken.
    pub fn register(&mut self, tool: RegisteredTool) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.index.contains_key(&name) {
            return Err(ToolError::DuplicateName { name });
        }
        self.index.insert(name, self.tools.len());
        self.tools.push(tool);
        Ok(())
    }

    /// Definitions for the model, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(RegisteredTool::definition).collect()
    }

    /// Entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredTool> {
        self.tools.iter()
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up and run a tool, keeping failures typed.
    pub async fn try_dispatch(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::UnknownTool {
            name: name.to_string(),
        })?;
        tool.invoke(arguments).await
    }

    /// Look up and run a tool. Every failure comes back as error text.
    pub async fn dispatch(&self, name: &str, arguments: ToolArguments) -> String {
        match self.try_dispatch(name, arguments).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("dispatch of '{name}' failed: {e}");
                format!("Error: {e}")
            }
        }
    }
}
