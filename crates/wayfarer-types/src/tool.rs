//! Tool trait, tool definitions, and argument schemas.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

use crate::{ToolArguments, ToolError};

/// One declared parameter of a tool.
///
/// Types are deliberately absent: arguments are treated as opaque values and
/// only presence of required names is checked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgumentSpec {
    pub name: String,
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl ArgumentSpec {
    pub fn required(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            description: description.into(),
        }
    }
}

/// Name, description and argument contract of a tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentSpec>,
    /// The schema this definition was parsed from, passed through to the
    /// model unchanged so property types survive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        arguments: Vec<ArgumentSpec>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            arguments,
            schema: None,
        }
    }

    /// Build a definition from a JSON-schema style `inputSchema`
    /// (`{"properties": {...}, "required": [...]}`).
    ///
    /// Only property names, their `description`, and the `required` list feed
    /// the argument list; the full schema is kept for [`Self::input_schema`].
    /// Required names that have no property entry are still recorded so
    /// validation catches them.
    pub fn from_input_schema(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: &serde_json::Value,
    ) -> Self {
        let required: Vec<&str> = schema
            .get("required")
            .and_then(|r| r.as_array())
            .map(|r| r.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut arguments: Vec<ArgumentSpec> = schema
            .get("properties")
            .and_then(|p| p.as_object())
            .map(|props| {
                props
                    .iter()
                    .map(|(prop_name, prop)| ArgumentSpec {
                        name: prop_name.clone(),
                        required: required.contains(&prop_name.as_str()),
                        description: prop
                            .get("description")
                            .or_else(|| prop.get("title"))
                            .and_then(|d| d.as_str())
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        for req in &required {
            if !arguments.iter().any(|a| a.name == *req) {
                arguments.push(ArgumentSpec::required(*req, ""));
            }
        }

        Self {
            schema: Some(schema.clone()),
            ..Self::new(name, description, arguments)
        }
    }

    /// Names of required arguments absent from `arguments`, in declaration order.
    pub fn missing_required(&self, arguments: &ToolArguments) -> Vec<String> {
        self.arguments
            .iter()
            .filter(|a| a.required && !arguments.contains_key(&a.name))
            .map(|a| a.name.clone())
            .collect()
    }

    /// Check `arguments` against the declared contract.
    pub fn validate(&self, arguments: &ToolArguments) -> Result<(), ToolError> {
        let missing = self.missing_required(arguments);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ToolError::MissingArguments {
                tool: self.name.clone(),
                missing,
            })
        }
    }

    /// JSON schema for model APIs: the original schema when one was parsed,
    /// otherwise one rendered from the argument list.
    pub fn input_schema(&self) -> serde_json::Value {
        if let Some(schema) = &self.schema {
            return schema.clone();
        }
        let properties: serde_json::Map<String, serde_json::Value> = self
            .arguments
            .iter()
            .map(|a| {
                let mut prop = serde_json::json!({ "type": "string" });
                if !a.description.is_empty() {
                    prop["description"] = serde_json::Value::String(a.description.clone());
                }
                (a.name.clone(), prop)
            })
            .collect();
        let required: Vec<&str> = self
            .arguments
            .iter()
            .filter(|a| a.required)
            .map(|a| a.name.as_str())
            .collect();

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Future returned by [`Tool::execute`].
pub type ToolFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + 'a>>;

/// Trait implemented by in-process tools.
///
/// Remote tools are not implementors; the registry wraps them separately.
pub trait Tool: Send + Sync {
    /// The unique name of this tool (used in API requests).
    fn name(&self) -> &str;

    /// The definition advertised to the model.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with the given arguments, returning text.
    fn execute(&self, arguments: ToolArguments) -> ToolFuture<'_>;
}
