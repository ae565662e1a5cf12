pub mod serve;
pub mod tools;

pub use serve::serve;
pub use tools::{ToolHandler, ToolRequest, ToolResponse};
