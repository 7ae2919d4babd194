use anyhow::{Context, Result};
use roam_core::agent::ToolRegistry;
use roam_core::config::Config;
use roam_core::mcp::McpServices;
use roam_core::output::ArtifactWriter;
use roam_core::pipeline::{
    BatchEvent, BatchOutcome, EventOrchestrator, Orchestrator, PipelineInput, PipelineRun,
    Roster, StageFactory,
};
use roam_core::providers;
use roam_core::tools::build_tools;
use roam_core::trace::{MemorySink, TraceRecord, Tracer, create_tracer};
use roam_core::traits::TraceSink;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a command needs, assembled once from the configuration.
pub struct App {
    pub config: Config,
    pub services: McpServices,
    pub roster: Roster,
    pub orchestrator: Orchestrator,
    pub events: EventOrchestrator,
    tracer: Tracer,
    memory: Arc<MemorySink>,
    writer: ArtifactWriter,
}

impl App {
    pub fn build(config_path: Option<&Path>, trace: bool) -> Result<Self> {
        Self::from_config(Config::load(config_path)?, trace)
    }

    pub fn from_config(mut config: Config, trace: bool) -> Result<Self> {
        if !trace {
            config.trace.enabled = false;
        }
        config.validate().context("Invalid configuration")?;

        let services = McpServices::from_config(&config);

        let memory = Arc::new(MemorySink::new());
        let tracer = create_tracer(
            &config.trace,
            &config.results_dir,
            vec![memory.clone() as Arc<dyn TraceSink>],
        );

        let tools = ToolRegistry::from_tools(build_tools(&services, &tracer));
        let provider = providers::create_provider(&config)?;
        let roster = Roster::load_or_default(config.roster.as_deref())?;

        let factory = StageFactory {
            tools: &tools,
            provider,
            tracer: &tracer,
            max_iterations: config.max_iterations,
        };
        let orchestrator = roster.build_orchestrator(&factory)?;
        let events = roster.build_event_orchestrator(&factory)?;

        info!(
            provider = %config.provider,
            model = %config.model,
            stages = orchestrator.len(),
            tools = tools.len(),
            tracing = tracer.is_enabled(),
            "pipeline ready"
        );

        let writer = ArtifactWriter::new(&config.results_dir);

        Ok(Self {
            config,
            services,
            roster,
            orchestrator,
            events,
            tracer,
            memory,
            writer,
        })
    }

    pub fn tracing_enabled(&self) -> bool {
        self.tracer.is_enabled()
    }

    pub async fn run_pipeline(&self, input: &PipelineInput) -> Result<PipelineRun> {
        let run = self.orchestrator.run(input).await;
        self.tracer.flush().await;
        Ok(run?)
    }

    /// Runs a single stage. The upstream payload comes from `from`, a
    /// `run.json` written by an earlier run.
    pub async fn run_stage(
        &self,
        name: &str,
        input: &PipelineInput,
        from: Option<&Path>,
    ) -> Result<PipelineRun> {
        let seed = match from {
            Some(path) => {
                let previous = load_run(path)?;
                let upstream = self.upstream_of(name);
                let seed = upstream.and_then(|u| previous.result(u).cloned());
                if seed.is_none() {
                    warn!(stage = name, file = %path.display(), "no upstream result in earlier run");
                }
                seed
            }
            None => None,
        };

        let run = self.orchestrator.run_stage(name, input, seed).await;
        self.tracer.flush().await;
        Ok(run?)
    }

    pub async fn dispatch(&self, event: &str, input: &PipelineInput) -> Result<PipelineRun> {
        let run = self.events.dispatch(event, input).await;
        self.tracer.flush().await;
        Ok(run?)
    }

    pub async fn process_batch(&self, events: &[BatchEvent]) -> Vec<BatchOutcome> {
        let outcomes = self.events.process_batch(events).await;
        self.tracer.flush().await;
        outcomes
    }

    pub fn save(&self, run: &PipelineRun) -> Result<PathBuf> {
        self.writer.write(run)
    }

    /// Trace records collected in this process for `run_id`.
    pub fn traces_for(&self, run_id: &str) -> Vec<TraceRecord> {
        self.memory
            .records()
            .into_iter()
            .filter(|r| r.run_id.as_deref() == Some(run_id))
            .collect()
    }

    fn upstream_of(&self, name: &str) -> Option<&str> {
        let names = self.roster.names();
        let index = names.iter().position(|n| *n == name)?;
        index.checked_sub(1).map(|i| names[i])
    }
}

fn load_run(path: &Path) -> Result<PipelineRun> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse run from {}", path.display()))
}

pub fn load_batch(path: &Path) -> Result<Vec<BatchEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse batch file {}", path.display()))
}
