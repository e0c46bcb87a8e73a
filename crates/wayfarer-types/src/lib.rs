//! Shared types and error hierarchy for Wayfarer.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;
pub mod util;

pub use error::{ApiError, ConfigError, ToolError, WayfarerError};
pub use message::*;
pub use tool::*;
pub use util::preview;
