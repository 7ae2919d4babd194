pub mod provider;
pub mod sink;
pub mod stage;
pub mod tool;

pub use provider::{ChatMessage, ChatRequest, ChatResponse, Provider, Role, ToolCall};
pub use sink::TraceSink;
pub use stage::Stage;
pub use tool::{Tool, ToolResult, ToolSpec};
