//! Tool registry and built-in local tools for Wayfarer.

mod calc;
mod registry;
mod time;

pub use calc::CalculatorTool;
pub use registry::{RegisteredTool, ToolRegistry};
pub use time::TimeTool;

use std::sync::Arc;
use wayfarer_types::Tool;

/// All built-in local tools.
pub fn builtin_tools() -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(TimeTool), Arc::new(CalculatorTool)]
}
