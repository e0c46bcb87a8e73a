//! Time tool: reports the current local time.

use wayfarer_types::{Tool, ToolArguments, ToolDefinition, ToolFuture};

/// Returns the current local time as `YYYY-MM-DD HH:MM:SS`.
pub struct TimeTool;

/// Output format of [`TimeTool`].
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

impl Tool for TimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_current_time",
            "Return the current local time in format YYYY-MM-DD HH:MM:SS.",
            vec![],
        )
    }

    fn execute(&self, _arguments: ToolArguments) -> ToolFuture<'_> {
        Box::pin(async move { Ok(chrono::Local::now().format(TIME_FORMAT).to_string()) })
    }
}
