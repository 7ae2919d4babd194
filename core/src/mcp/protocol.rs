use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const RUN_PATH: &str = "/mcp/run";
pub const HEALTH_PATH: &str = "/health";

/// Body of a `POST /mcp/run` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpRequest {
    pub method: String,
    #[serde(default)]
    pub args: Map<String, Value>,
}

impl McpRequest {
    pub fn new(method: impl Into<String>, args: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}
