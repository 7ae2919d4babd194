use crate::error::PipelineError;
use crate::pipeline::{PipelineInput, PipelineRun, StageContext, StageResult, check_upstream};
use crate::trace::{TraceCall, Tracer, scope_run};
use crate::traits::Stage;
use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

pub const DEFAULT_FLOW_NAME: &str = "content_pipeline";

/// `<date>-<8 hex chars>`, unique per run.
pub fn new_run_id(input: &PipelineInput) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", input.date_string(), &suffix[..8])
}

/// Runs a fixed list of stages in order, feeding each one the results of the
/// stages before it.
pub struct Orchestrator {
    name: String,
    stages: Vec<Arc<dyn Stage>>,
    tracer: Tracer,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_FLOW_NAME)
    }
}

impl Orchestrator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: vec![],
            tracer: Tracer::disabled(),
        }
    }

    pub fn with_stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Runs every stage. The first failure ends the run; later stages never
    /// start.
    pub async fn run(&self, input: &PipelineInput) -> Result<PipelineRun, PipelineError> {
        input.validate()?;
        if self.stages.is_empty() {
            return Err(PipelineError::Empty);
        }

        let run_id = new_run_id(input);
        let started_at = Utc::now();
        info!(flow = %self.name, run_id = %run_id, stages = self.stages.len(), "starting run");

        let call = TraceCall::flow(&self.name).with_inputs(json!({ "input": input }));
        let results = scope_run(
            run_id.clone(),
            self.tracer.traced(call, self.run_all(&run_id, input)),
        )
        .await?;

        info!(flow = %self.name, run_id = %run_id, "run complete");
        Ok(PipelineRun {
            run_id,
            input: input.clone(),
            results,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_all(
        &self,
        run_id: &str,
        input: &PipelineInput,
    ) -> Result<Vec<StageResult>, PipelineError> {
        let mut results = Vec::with_capacity(self.stages.len());
        for (index, stage) in self.stages.iter().enumerate() {
            let result =
                execute_stage(stage.as_ref(), index, run_id, input, &results, &self.tracer).await?;
            results.push(result);
        }
        Ok(results)
    }

    /// Runs only `name`, optionally seeded with the payload its upstream stage
    /// would have produced. The seed is not part of the returned run.
    pub async fn run_stage(
        &self,
        name: &str,
        input: &PipelineInput,
        seed: Option<StageResult>,
    ) -> Result<PipelineRun, PipelineError> {
        input.validate()?;
        let (index, stage) = self
            .stages
            .iter()
            .enumerate()
            .find(|(_, s)| s.name() == name)
            .ok_or_else(|| PipelineError::UnknownStage(name.to_string()))?;

        let run_id = new_run_id(input);
        let started_at = Utc::now();
        let previous: Vec<StageResult> = seed.into_iter().collect();

        let result = scope_run(
            run_id.clone(),
            execute_stage(stage.as_ref(), index, &run_id, input, &previous, &self.tracer),
        )
        .await?;

        Ok(PipelineRun {
            run_id,
            input: input.clone(),
            results: vec![result],
            started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Checks the stage's upstream requirements, runs it under a trace and wraps
/// the payload in a [`StageResult`].
pub(crate) async fn execute_stage(
    stage: &dyn Stage,
    index: usize,
    run_id: &str,
    input: &PipelineInput,
    previous: &[StageResult],
    tracer: &Tracer,
) -> Result<StageResult, PipelineError> {
    let upstream = previous.last();
    check_upstream(stage.name(), stage.requires(), upstream)?;

    info!(stage = stage.name(), index, "running stage");
    let ctx = StageContext::new(run_id, input, previous);
    let call = TraceCall::stage(stage.name()).with_inputs(json!({
        "index": index,
        "upstream": upstream.map(|r| r.stage.as_str()),
    }));

    let start = Instant::now();
    let payload = tracer
        .traced(call, stage.run(&ctx))
        .await
        .map_err(|source| PipelineError::StageFailed {
            stage: stage.name().to_string(),
            index,
            source,
        })?;

    Ok(StageResult::new(
        stage.name(),
        payload,
        start.elapsed().as_millis() as u64,
    ))
}
