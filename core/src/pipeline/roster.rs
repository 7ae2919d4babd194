use crate::agent::{AgentLoop, AgentProfile, ToolRegistry};
use crate::error::ConfigError;
use crate::pipeline::{AgentStage, EventOrchestrator, Orchestrator};
use crate::trace::Tracer;
use crate::traits::{Provider, Stage};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

const DEFAULT_ROSTER: &str = include_str!("default_roster.yaml");

/// Declaration of one stage: the agent that performs it, its task and how it
/// links to the stages around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    pub agent: AgentProfile,
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
    /// Event that triggers this stage in the event-driven flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emits: Option<String>,
}

/// Everything needed to turn stage declarations into runnable stages.
pub struct StageFactory<'a> {
    pub tools: &'a ToolRegistry,
    pub provider: Arc<dyn Provider>,
    pub tracer: &'a Tracer,
    pub max_iterations: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Roster {
    pub stages: Vec<StageSpec>,
}

impl Roster {
    pub fn default_roster() -> Result<Self> {
        Self::from_yaml_str(DEFAULT_ROSTER).context("Built-in roster is invalid")
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let roster: Roster = serde_yaml::from_str(content).context("Failed to parse roster")?;
        roster.validate()?;
        Ok(roster)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read roster from {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid roster file {}", path.display()))
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::default_roster(),
        }
    }

    /// Stage names become file names under the results directory, and each
    /// event may start at most one stage.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        let mut handlers: HashMap<&str, &str> = HashMap::new();
        for stage in &self.stages {
            if !is_valid_stage_name(&stage.name) {
                return Err(ConfigError::InvalidStageName(stage.name.clone()));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(ConfigError::DuplicateStage(stage.name.clone()));
            }
            if let Some(event) = &stage.event
                && let Some(first) = handlers.insert(event.as_str(), stage.name.as_str())
            {
                return Err(ConfigError::DuplicateEvent {
                    event: event.clone(),
                    first: first.to_string(),
                    second: stage.name.clone(),
                });
            }
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    fn build_stage(spec: &StageSpec, factory: &StageFactory<'_>) -> Result<Arc<dyn Stage>, ConfigError> {
        let tools = factory.tools.scoped(&spec.name, &spec.agent.tools)?;
        let agent = AgentLoop::new(spec.agent.clone(), factory.provider.clone(), tools)
            .with_tracer(factory.tracer.clone())
            .with_max_iterations(factory.max_iterations);

        Ok(Arc::new(
            AgentStage::new(spec.name.clone(), agent, spec.task.clone())
                .with_expected_output(spec.expected_output.clone())
                .with_requires(spec.requires.clone()),
        ))
    }

    /// Sequential orchestrator over every stage, in roster order.
    pub fn build_orchestrator(&self, factory: &StageFactory<'_>) -> Result<Orchestrator, ConfigError> {
        let mut orchestrator = Orchestrator::default().with_tracer(factory.tracer.clone());
        for spec in &self.stages {
            orchestrator = orchestrator.with_stage(Self::build_stage(spec, factory)?);
        }
        Ok(orchestrator)
    }

    /// Event orchestrator over the stages that declare an event.
    pub fn build_event_orchestrator(
        &self,
        factory: &StageFactory<'_>,
    ) -> Result<EventOrchestrator, ConfigError> {
        let mut events = EventOrchestrator::default().with_tracer(factory.tracer.clone());
        for spec in &self.stages {
            if let Some(event) = &spec.event {
                events.on(event.clone(), Self::build_stage(spec, factory)?, spec.emits.clone());
            }
        }
        Ok(events)
    }
}

fn is_valid_stage_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mcp::McpServices;
    use crate::testing::ScriptedProvider;
    use crate::tools::build_tools;
    use tempfile::TempDir;

    fn catalog() -> ToolRegistry {
        let services = McpServices::from_config(&Config::default());
        ToolRegistry::from_tools(build_tools(&services, &Tracer::disabled()))
    }

    #[test]
    fn default_roster_has_six_chained_stages() {
        let roster = Roster::default_roster().unwrap();
        assert_eq!(
            roster.names(),
            [
                "analyze_content",
                "research_locations",
                "plan_route",
                "design_itinerary",
                "create_narrative",
                "schedule_calendar"
            ]
        );

        for pair in roster.stages.windows(2) {
            assert_eq!(pair[0].emits, pair[1].event, "{} -> {}", pair[0].name, pair[1].name);
        }
        assert_eq!(roster.stages[0].event.as_deref(), Some("pipeline_start"));
        assert!(roster.stages[5].emits.is_none());
        assert_eq!(roster.get("plan_route").unwrap().requires, ["venues"]);
    }

    #[test]
    fn default_roster_builds_against_catalog() {
        let roster = Roster::default_roster().unwrap();
        let tools = catalog();
        let factory = StageFactory {
            tools: &tools,
            provider: Arc::new(ScriptedProvider::default()),
            tracer: &Tracer::disabled(),
            max_iterations: 10,
        };

        let orchestrator = roster.build_orchestrator(&factory).unwrap();
        assert_eq!(orchestrator.len(), 6);

        let events = roster.build_event_orchestrator(&factory).unwrap();
        assert_eq!(events.events().len(), 6);
    }

    #[test]
    fn unknown_tool_fails_the_build() {
        let roster = Roster::from_yaml_str(
            "stages:\n  - name: forecast\n    task: Check the weather\n    agent:\n      name: w\n      role: Forecaster\n      goal: Forecast\n      tools: [weather]\n",
        )
        .unwrap();
        let tools = catalog();
        let factory = StageFactory {
            tools: &tools,
            provider: Arc::new(ScriptedProvider::default()),
            tracer: &Tracer::disabled(),
            max_iterations: 10,
        };

        assert!(matches!(
            roster.build_orchestrator(&factory),
            Err(ConfigError::UnknownTool { ref stage, .. }) if stage == "forecast"
        ));
    }

    #[test]
    fn duplicate_stage_names_are_rejected() {
        let yaml = "stages:\n  - {name: a, task: t, agent: {name: x, role: r, goal: g}}\n  - {name: a, task: t, agent: {name: y, role: r, goal: g}}\n";
        let err = Roster::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn two_stages_on_one_event_are_rejected() {
        let yaml = "stages:\n  - {name: a, task: t, event: start, agent: {name: x, role: r, goal: g}}\n  - {name: b, task: t, event: start, agent: {name: y, role: r, goal: g}}\n";
        let err = Roster::from_yaml_str(yaml).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::DuplicateEvent { event, first, second })
                if event == "start" && first == "a" && second == "b"
        ));
    }

    #[test]
    fn stage_names_must_be_file_safe() {
        for name in ["../x", "a/b", "with space", ""] {
            let yaml = format!(
                "stages:\n  - {{name: {name:?}, task: t, agent: {{name: x, role: r, goal: g}}}}\n"
            );
            let err = Roster::from_yaml_str(&yaml).unwrap_err();
            assert!(
                matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::InvalidStageName(_))),
                "{name:?} accepted"
            );
        }
        assert!(is_valid_stage_name("plan_route-2"));
    }

    #[test]
    fn loads_roster_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("roster.yaml");
        std::fs::write(
            &path,
            "stages:\n  - name: analyze_content\n    task: Watch {content_ref}\n    agent: {name: a, role: Analyst, goal: Analyze, tools: [youtube]}\n",
        )
        .unwrap();

        let roster = Roster::load_or_default(Some(&path)).unwrap();
        assert_eq!(roster.names(), ["analyze_content"]);
        assert!(roster.stages[0].event.is_none());
    }
}
