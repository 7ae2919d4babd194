use crate::error::ConfigError;
use crate::traits::{Tool, ToolResult, ToolSpec};
use std::sync::Arc;

/// An ordered set of tools. Each agent owns one holding exactly its
/// capability set.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Adds a tool, replacing any tool already registered under the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.iter().any(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get_specs(&self) -> Vec<ToolSpec> {
        self.tools.iter().map(|t| t.spec()).collect()
    }

    /// Narrows the registry to `names` on behalf of `owner`. A name may be a
    /// tool name or a service name.
    pub fn scoped(&self, owner: &str, names: &[String]) -> Result<ToolRegistry, ConfigError> {
        let mut scoped = ToolRegistry::new();

        for name in names {
            if let Some(tool) = self.get(name) {
                scoped.register(tool);
                continue;
            }

            let by_service: Vec<_> = self
                .tools
                .iter()
                .filter(|t| t.service() == Some(name.as_str()))
                .cloned()
                .collect();
            if by_service.is_empty() {
                return Err(ConfigError::UnknownTool {
                    stage: owner.to_string(),
                    tool: name.clone(),
                });
            }
            for tool in by_service {
                scoped.register(tool);
            }
        }

        Ok(scoped)
    }

    pub async fn execute(&self, name: &str, args: serde_json::Value) -> ToolResult {
        match self.get(name) {
            Some(tool) => match tool.execute(args).await {
                Ok(result) => result,
                Err(e) => ToolResult::error(format!("Execution failed: {}", e)),
            },
            None => ToolResult::error(format!("Tool '{}' not found", name)),
        }
    }
}
