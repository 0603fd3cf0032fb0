//! Tool definitions, the registry that resolves tool names requested by the
//! model, and the built-in tools.

pub mod builtin;
mod definition;
pub mod error;
mod registry;
pub mod retrieval;

pub use definition::{ToolDefinition, ToolParameter};
pub use error::{Error, ToolError};
pub use registry::{SafetyClass, ToolContext, ToolDescriptor, ToolHandler, ToolRegistry};
