use crate::agent::AgentProfile;
use crate::pipeline::{PipelineInput, StageResult};
use crate::traits::{ChatMessage, ToolSpec};
use std::fmt::Write;

/// Assembles the messages an agent sends to the reasoning service.
pub struct ContextBuilder<'a> {
    profile: &'a AgentProfile,
    tool_specs: &'a [ToolSpec],
    run_id: Option<String>,
}

impl<'a> ContextBuilder<'a> {
    pub fn new(profile: &'a AgentProfile) -> Self {
        Self {
            profile,
            tool_specs: &[],
            run_id: None,
        }
    }

    pub fn with_tool_specs(mut self, tool_specs: &'a [ToolSpec]) -> Self {
        self.tool_specs = tool_specs;
        self
    }

    pub fn with_run_id(mut self, run_id: Option<String>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn build_system_prompt(&self) -> String {
        let mut parts = vec![self.get_identity()];

        if !self.tool_specs.is_empty() {
            parts.push(self.get_tool_instructions());
        }

        parts.push(self.get_runtime_context());
        parts.push(
            "## Output\n\nWhen you are done, answer with a single JSON object and nothing else."
                .to_string(),
        );

        parts.join("\n\n---\n\n")
    }

    fn get_identity(&self) -> String {
        let mut identity = format!(
            "## Agent Identity\n\nYou are the {}.\n\nGoal: {}",
            self.profile.role, self.profile.goal
        );
        if !self.profile.backstory.trim().is_empty() {
            let _ = write!(identity, "\n\n{}", self.profile.backstory.trim());
        }
        identity
    }

    fn get_tool_instructions(&self) -> String {
        let mut instructions = String::new();
        instructions.push_str("## Tool Use Protocol\n\n");
        instructions.push_str("To use a tool, wrap a JSON object in <tool_call> tags:\n\n");
        instructions.push_str("```\n<tool_call>\n{\"name\": \"tool_name\", \"arguments\": {\"param\": \"value\"}}\n</tool_call>\n```\n\n");
        instructions.push_str("Only the tools listed below exist. ");
        instructions.push_str("Tool results are returned to you in the next message. ");
        instructions.push_str("Continue until you can give the final answer.\n\n");
        instructions.push_str("### Available Tools\n\n");

        for tool in self.tool_specs {
            let _ = writeln!(
                instructions,
                "**{}**: {}\nParameters: `{}`\n",
                tool.name, tool.description, tool.parameters_schema
            );
        }

        instructions
    }

    fn get_runtime_context(&self) -> String {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M (%A)");
        let mut context = format!("## Runtime Context\n\n### Current Time\n{timestamp}");
        if let Some(run_id) = &self.run_id {
            let _ = write!(context, "\n\n### Run\n{run_id}");
        }
        context
    }

    pub fn build_messages(&self, task: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.build_system_prompt()),
            ChatMessage::user(task),
        ]
    }
}

/// The user message for one stage: what to do, the run input and the
/// payloads produced so far.
pub fn task_message(
    description: &str,
    expected_output: Option<&str>,
    input: &PipelineInput,
    upstream: &[StageResult],
) -> String {
    let mut message = format!("## Task\n\n{}\n", description.trim());

    if let Some(expected) = expected_output.filter(|e| !e.trim().is_empty()) {
        let _ = write!(message, "\n## Expected Output\n\n{}\n", expected.trim());
    }

    let _ = write!(
        message,
        "\n## Request\n\n```json\n{}\n```\n",
        serde_json::to_string_pretty(input).unwrap_or_default()
    );

    if !upstream.is_empty() {
        message.push_str("\n## Results From Earlier Stages\n");
        for result in upstream {
            let _ = write!(
                message,
                "\n### {}\n\n```json\n{}\n```\n",
                result.stage,
                serde_json::to_string_pretty(&result.payload).unwrap_or_default()
            );
        }
    }

    message
}
