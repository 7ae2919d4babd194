use crate::agent::{AgentLoop, task_message};
use crate::pipeline::StageContext;
use crate::traits::Stage;
use async_trait::async_trait;
use serde_json::Value;

/// A stage carried out by one agent. The task text may reference
/// `{content_ref}`, `{location}`, `{date}` and `{participants}`.
pub struct AgentStage {
    name: String,
    agent: AgentLoop,
    task: String,
    expected_output: Option<String>,
    requires: Vec<String>,
}

impl AgentStage {
    pub fn new(name: impl Into<String>, agent: AgentLoop, task: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            agent,
            task: task.into(),
            expected_output: None,
            requires: vec![],
        }
    }

    pub fn with_expected_output(mut self, expected_output: Option<String>) -> Self {
        self.expected_output = expected_output;
        self
    }

    pub fn with_requires(mut self, requires: Vec<String>) -> Self {
        self.requires = requires;
        self
    }

    pub fn agent(&self) -> &AgentLoop {
        &self.agent
    }
}

#[async_trait]
impl Stage for AgentStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[String] {
        &self.requires
    }

    async fn run(&self, ctx: &StageContext<'_>) -> anyhow::Result<Value> {
        let task = task_message(
            &ctx.input.render(&self.task),
            self.expected_output.as_deref(),
            ctx.input,
            ctx.previous,
        );
        self.agent.execute(&task).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentProfile, ToolRegistry};
    use crate::pipeline::{PipelineInput, StageResult};
    use crate::testing::ScriptedProvider;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn renders_task_and_returns_agent_payload() {
        let provider = Arc::new(ScriptedProvider::repeating(r#"{"venues": ["Gas Works Park"]}"#, 1));
        let agent = AgentLoop::new(
            AgentProfile::new("local_researcher", "Researcher", "Find venues"),
            provider.clone(),
            ToolRegistry::new(),
        );
        let stage = AgentStage::new("research_locations", agent, "Find things in {location} on {date}")
            .with_requires(vec!["topics".to_string()]);

        let input = PipelineInput::parse("abc123", "Seattle, WA", "2024-01-15").unwrap();
        let previous = vec![StageResult::new("analyze_content", json!({"topics": ["kites"]}), 3)];
        let payload = stage
            .run(&StageContext::new("run-1", &input, &previous))
            .await
            .unwrap();

        assert_eq!(payload["venues"][0], "Gas Works Park");
        assert_eq!(stage.requires(), ["topics"]);

        let task = &provider.requests()[0][1].content;
        assert!(task.contains("Find things in Seattle, WA on 2024-01-15"));
        assert!(task.contains("kites"));
    }
}
