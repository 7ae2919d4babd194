pub mod agent;
pub mod config;
pub mod error;
pub mod mcp;
pub mod output;
pub mod pipeline;
pub mod providers;
pub mod tools;
pub mod trace;
pub mod traits;

#[cfg(test)]
mod testing;

pub use agent::{AgentLoop, AgentProfile, ContextBuilder, ToolRegistry};
pub use config::{Config, ServiceConfig, TraceConfig};
pub use error::{AgentError, ConfigError, PipelineError, ToolError};
pub use mcp::{McpClient, McpServices};
pub use output::ArtifactWriter;
pub use pipeline::{
    EventOrchestrator, Orchestrator, PipelineInput, PipelineRun, Roster, StageContext,
    StageResult,
};
pub use providers::{OllamaProvider, OpenAIProvider, create_provider};
pub use tools::{RemoteTool, build_tools};
pub use trace::{TraceRecord, Tracer, create_tracer};
pub use traits::{ChatMessage, ChatResponse, Provider, Stage, Tool, ToolResult, TraceSink};
