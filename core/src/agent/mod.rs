pub mod context;
pub mod loop_;
pub mod parse;
pub mod profile;
pub mod registry;

pub use context::{ContextBuilder, task_message};
pub use loop_::{AgentLoop, DEFAULT_MAX_ITERATIONS};
pub use profile::AgentProfile;
pub use registry::ToolRegistry;
