use crate::agent::parse::{parse_tool_calls, payload_from_text};
use crate::agent::{AgentProfile, ContextBuilder, ToolRegistry};
use crate::error::AgentError;
use crate::tools::check_required_args;
use crate::trace::{TraceCall, Tracer, current_run_id};
use crate::traits::{ChatMessage, ChatRequest, Provider, ToolCall};
use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{debug, info};

pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Runs one agent: asks the provider, executes the tool calls it requests and
/// stops at the first answer that carries no tool calls.
pub struct AgentLoop {
    profile: AgentProfile,
    provider: Arc<dyn Provider>,
    tools: ToolRegistry,
    tracer: Tracer,
    max_iterations: usize,
}

impl AgentLoop {
    /// `tools` must already be narrowed to the agent's capability set.
    pub fn new(profile: AgentProfile, provider: Arc<dyn Provider>, tools: ToolRegistry) -> Self {
        Self {
            profile,
            provider,
            tools,
            tracer: Tracer::disabled(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Executes `task` and returns the final answer as a JSON object.
    pub async fn execute(&self, task: &str) -> Result<Value> {
        let call = TraceCall::agent(&self.profile.name).with_inputs(json!({
            "role": self.profile.role,
            "task": task,
        }));
        self.tracer.traced(call, self.run_loop(task)).await
    }

    async fn run_loop(&self, task: &str) -> Result<Value> {
        let specs = self.tools.get_specs();
        let mut messages = ContextBuilder::new(&self.profile)
            .with_tool_specs(&specs)
            .with_run_id(current_run_id())
            .build_messages(task);

        for iteration in 1..=self.max_iterations {
            let request = ChatRequest {
                messages: &messages,
                tools: (!specs.is_empty()).then_some(specs.as_slice()),
            };

            let response = self.provider.chat(request).await.with_context(|| {
                format!(
                    "{} request failed for agent '{}'",
                    self.provider.name(),
                    self.profile.name
                )
            })?;

            let (text, tool_calls) = if response.has_tool_calls() {
                (response.text_or_empty().to_string(), response.tool_calls)
            } else {
                parse_tool_calls(response.text_or_empty())
            };

            if tool_calls.is_empty() {
                if text.trim().is_empty() {
                    return Err(AgentError::EmptyResponse {
                        agent: self.profile.name.clone(),
                    }
                    .into());
                }
                info!(agent = %self.profile.name, iteration, "agent finished");
                return Ok(payload_from_text(&text));
            }

            debug!(
                agent = %self.profile.name,
                iteration,
                calls = tool_calls.len(),
                "executing tool calls"
            );
            messages.push(ChatMessage::assistant_with_tool_calls(
                text,
                tool_calls.clone(),
            ));

            for tool_call in tool_calls {
                let output = self.execute_tool(&tool_call).await?;
                messages.push(ChatMessage::tool_result(tool_call.id, output));
            }
        }

        Err(AgentError::MaxIterations {
            agent: self.profile.name.clone(),
            max: self.max_iterations,
        }
        .into())
    }

    async fn execute_tool(&self, call: &ToolCall) -> Result<String, AgentError> {
        let Some(tool) = self.tools.get(&call.name) else {
            return Err(AgentError::ToolNotAllowed {
                agent: self.profile.name.clone(),
                tool: call.name.clone(),
            });
        };

        let invalid = |reason: String| AgentError::InvalidToolArguments {
            tool: call.name.clone(),
            reason,
        };

        let args: Value = if call.arguments.trim().is_empty() {
            Value::Object(Map::new())
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| invalid(e.to_string()))?
        };
        let args = check_required_args(&tool.parameters_schema(), args).map_err(invalid)?;

        let result = self.tools.execute(&call.name, Value::Object(args)).await;
        if result.success {
            Ok(result.output)
        } else {
            Err(AgentError::ToolFailed {
                tool: call.name.clone(),
                message: result.error_message().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CannedTool, ScriptedProvider, tool_call};
    use crate::trace::{MemorySink, TraceKind, TraceStatus};
    use crate::traits::{ChatResponse, Role, ToolResult};

    fn profile() -> AgentProfile {
        AgentProfile::new("researcher", "Local Researcher", "Find venues").with_tools(["lookup"])
    }

    fn registry(tool: Arc<CannedTool>) -> ToolRegistry {
        ToolRegistry::from_tools([tool as Arc<dyn crate::traits::Tool>])
    }

    fn agent_error(err: &anyhow::Error) -> &AgentError {
        err.downcast_ref::<AgentError>().expect("agent error")
    }

    #[tokio::test]
    async fn final_text_becomes_payload() {
        let provider = Arc::new(ScriptedProvider::new(vec![ChatResponse::text(
            r#"{"venues": ["Pike Place"]}"#,
        )]));
        let agent = AgentLoop::new(profile(), provider.clone(), ToolRegistry::new());

        let payload = agent.execute("find venues").await.unwrap();

        assert_eq!(payload, json!({"venues": ["Pike Place"]}));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn native_tool_call_result_is_fed_back() {
        let tool = Arc::new(CannedTool::new("lookup", ToolResult::success("{\"hits\":3}")));
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("c1", "lookup", json!({"query": "coffee"})),
            ChatResponse::text(r#"{"count": 3}"#),
        ]));
        let agent = AgentLoop::new(profile(), provider.clone(), registry(tool.clone()));

        let payload = agent.execute("count coffee shops").await.unwrap();

        assert_eq!(payload["count"], 3);
        assert_eq!(tool.calls(), 1);
        let second = &provider.requests()[1];
        let last = second.last().unwrap();
        assert_eq!(last.role, Role::Tool);
        assert_eq!(last.tool_call_id.as_deref(), Some("c1"));
        assert_eq!(last.content, "{\"hits\":3}");
    }

    #[tokio::test]
    async fn tagged_tool_call_in_text_is_executed() {
        let tool = Arc::new(CannedTool::new("lookup", ToolResult::success("ok")));
        let provider = Arc::new(ScriptedProvider::new(vec![
            ChatResponse::text(
                "<tool_call>{\"name\": \"lookup\", \"arguments\": {\"query\": \"x\"}}</tool_call>",
            ),
            ChatResponse::text("all done"),
        ]));
        let agent = AgentLoop::new(profile(), provider, registry(tool.clone()));

        let payload = agent.execute("task").await.unwrap();

        assert_eq!(payload, json!({"text": "all done"}));
        assert_eq!(tool.calls(), 1);
    }

    #[tokio::test]
    async fn tool_outside_capability_set_aborts() {
        let tool = Arc::new(CannedTool::new("lookup", ToolResult::success("ok")));
        let provider = Arc::new(ScriptedProvider::new(vec![tool_call(
            "c1",
            "calendar_create_event",
            json!({}),
        )]));
        let agent = AgentLoop::new(profile(), provider, registry(tool.clone()));

        let err = agent.execute("task").await.unwrap_err();

        assert!(matches!(
            agent_error(&err),
            AgentError::ToolNotAllowed { tool, .. } if tool == "calendar_create_event"
        ));
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn failed_tool_aborts_instead_of_continuing() {
        let tool = Arc::new(CannedTool::new("lookup", ToolResult::error("maps.route returned 503")));
        let provider = Arc::new(ScriptedProvider::new(vec![
            tool_call("c1", "lookup", json!({"query": "x"})),
            ChatResponse::text("{}"),
        ]));
        let agent = AgentLoop::new(profile(), provider.clone(), registry(tool));

        let err = agent.execute("task").await.unwrap_err();

        assert!(matches!(
            agent_error(&err),
            AgentError::ToolFailed { message, .. } if message.contains("503")
        ));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn missing_required_argument_aborts() {
        let tool = Arc::new(CannedTool::new("lookup", ToolResult::success("ok")));
        let provider = Arc::new(ScriptedProvider::new(vec![tool_call("c1", "lookup", json!({}))]));
        let agent = AgentLoop::new(profile(), provider, registry(tool.clone()));

        let err = agent.execute("task").await.unwrap_err();

        assert!(matches!(agent_error(&err), AgentError::InvalidToolArguments { .. }));
        assert_eq!(tool.calls(), 0);
    }

    #[tokio::test]
    async fn iteration_bound_is_enforced() {
        let tool = Arc::new(CannedTool::new("lookup", ToolResult::success("again")));
        let provider = Arc::new(ScriptedProvider::new(
            (0..5)
                .map(|i| tool_call(&format!("c{i}"), "lookup", json!({"query": "x"})))
                .collect(),
        ));
        let agent = AgentLoop::new(profile(), provider.clone(), registry(tool)).with_max_iterations(3);

        let err = agent.execute("task").await.unwrap_err();

        assert!(matches!(agent_error(&err), AgentError::MaxIterations { max: 3, .. }));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn empty_answer_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![ChatResponse::default()]));
        let agent = AgentLoop::new(profile(), provider, ToolRegistry::new());

        let err = agent.execute("task").await.unwrap_err();
        assert!(matches!(agent_error(&err), AgentError::EmptyResponse { .. }));
    }

    #[tokio::test]
    async fn execution_is_traced_as_agent_call() {
        let sink = Arc::new(MemorySink::new());
        let provider = Arc::new(ScriptedProvider::repeating("{\"ok\": true}", 1));
        let agent = AgentLoop::new(profile(), provider, ToolRegistry::new())
            .with_tracer(Tracer::new(sink.clone()));

        agent.execute("task").await.unwrap();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, TraceKind::Agent);
        assert_eq!(records[0].name, "agent.researcher.execute");
        assert_eq!(records[0].inputs["task"], "task");
        assert_eq!(records[0].status, TraceStatus::Success);
    }
}
