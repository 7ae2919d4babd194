use crate::error::PipelineError;
use crate::pipeline::orchestrator::{execute_stage, new_run_id};
use crate::pipeline::{PipelineInput, PipelineRun, StageResult};
use crate::trace::{TraceCall, Tracer, scope_run};
use crate::traits::Stage;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_EVENT_FLOW_NAME: &str = "event_orchestrator";

struct EventHandler {
    event: String,
    stage: Arc<dyn Stage>,
    emits: Option<String>,
}

/// Runs stages in response to named events. A handler runs its stage and
/// may emit a follow-up event, which triggers the next handler.
pub struct EventOrchestrator {
    name: String,
    handlers: Vec<EventHandler>,
    tracer: Tracer,
}

impl Default for EventOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_FLOW_NAME)
    }
}

/// One entry of a batch file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEvent {
    pub event_type: String,
    pub input: PipelineInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub index: usize,
    pub event_type: String,
    pub status: BatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run: Option<PipelineRun>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EventOrchestrator {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: vec![],
            tracer: Tracer::disabled(),
        }
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    /// Registers `stage` for `event`, replacing an existing handler.
    pub fn on(
        &mut self,
        event: impl Into<String>,
        stage: Arc<dyn Stage>,
        emits: Option<String>,
    ) -> &mut Self {
        let event = event.into();
        self.handlers.retain(|h| h.event != event);
        self.handlers.push(EventHandler {
            event,
            stage,
            emits,
        });
        self
    }

    pub fn events(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.event.as_str()).collect()
    }

    fn handler(&self, event: &str) -> Option<&EventHandler> {
        self.handlers.iter().find(|h| h.event == event)
    }

    /// Runs the chain that starts at `event`. The chain ends when a handler
    /// emits nothing or emits an event nobody listens to.
    pub async fn dispatch(
        &self,
        event: &str,
        input: &PipelineInput,
    ) -> Result<PipelineRun, PipelineError> {
        input.validate()?;
        if self.handler(event).is_none() {
            return Err(PipelineError::UnknownEvent(event.to_string()));
        }

        let run_id = new_run_id(input);
        let started_at = Utc::now();
        info!(flow = %self.name, run_id = %run_id, event, "dispatching event");

        let call = TraceCall::flow(&self.name).with_inputs(json!({
            "event": event,
            "input": input,
        }));
        let results = scope_run(
            run_id.clone(),
            self.tracer.traced(call, self.run_chain(&run_id, event, input)),
        )
        .await?;

        Ok(PipelineRun {
            run_id,
            input: input.clone(),
            results,
            started_at,
            finished_at: Utc::now(),
        })
    }

    async fn run_chain(
        &self,
        run_id: &str,
        start: &str,
        input: &PipelineInput,
    ) -> Result<Vec<StageResult>, PipelineError> {
        let mut results: Vec<StageResult> = vec![];
        let mut current = Some(start.to_string());

        while let Some(event) = current.take() {
            let Some(handler) = self.handler(&event) else {
                debug!(event = %event, "no handler for emitted event, chain ends");
                break;
            };

            if results.len() >= self.handlers.len() {
                return Err(PipelineError::EventLoop {
                    start: start.to_string(),
                    limit: self.handlers.len(),
                });
            }

            let index = results.len();
            let result = execute_stage(
                handler.stage.as_ref(),
                index,
                run_id,
                input,
                &results,
                &self.tracer,
            )
            .await?;
            results.push(result);
            current = handler.emits.clone();
        }

        Ok(results)
    }

    /// Processes every event in order. A failing event is reported and the
    /// batch moves on.
    pub async fn process_batch(&self, events: &[BatchEvent]) -> Vec<BatchOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            info!(index, total = events.len(), event = %event.event_type, "processing batch event");
            let outcome = match self.dispatch(&event.event_type, &event.input).await {
                Ok(run) => BatchOutcome {
                    index,
                    event_type: event.event_type.clone(),
                    status: BatchStatus::Success,
                    run: Some(run),
                    error: None,
                },
                Err(e) => {
                    warn!(index, event = %event.event_type, error = %e, "batch event failed");
                    BatchOutcome {
                        index,
                        event_type: event.event_type.clone(),
                        status: BatchStatus::Error,
                        run: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FixedStage;

    fn seattle() -> PipelineInput {
        PipelineInput::parse("abc123", "Seattle, WA", "2024-01-15").unwrap()
    }

    fn chained() -> (EventOrchestrator, Vec<Arc<FixedStage>>) {
        let analyze = Arc::new(FixedStage::new("analyze_content", json!({"topics": ["art"]})));
        let research = Arc::new(
            FixedStage::new("research_locations", json!({"venues": ["SAM"]})).with_requires(&["topics"]),
        );
        let route = Arc::new(FixedStage::new("plan_route", json!({"route": []})).with_requires(&["venues"]));

        let mut events = EventOrchestrator::default();
        events
            .on("pipeline_start", analyze.clone(), Some("analysis_complete".to_string()))
            .on("analysis_complete", research.clone(), Some("research_complete".to_string()))
            .on("research_complete", route.clone(), Some("route_complete".to_string()));
        (events, vec![analyze, research, route])
    }

    #[tokio::test]
    async fn dispatch_follows_emitted_events() {
        let (events, _) = chained();

        let run = events.dispatch("pipeline_start", &seattle()).await.unwrap();

        let names: Vec<&str> = run.results.iter().map(|r| r.stage.as_str()).collect();
        assert_eq!(names, ["analyze_content", "research_locations", "plan_route"]);
    }

    #[tokio::test]
    async fn dispatch_can_start_mid_chain_but_checks_requirements() {
        let (events, stages) = chained();

        let err = events.dispatch("analysis_complete", &seattle()).await.unwrap_err();

        assert!(matches!(err, PipelineError::MalformedUpstream { .. }));
        assert_eq!(stages[1].runs(), 0);
    }

    #[tokio::test]
    async fn unknown_event_is_rejected() {
        let (events, _) = chained();
        assert!(matches!(
            events.dispatch("video_uploaded", &seattle()).await,
            Err(PipelineError::UnknownEvent(_))
        ));
    }

    #[tokio::test]
    async fn cyclic_chain_is_stopped() {
        let mut events = EventOrchestrator::default();
        events
            .on("ping", Arc::new(FixedStage::new("a", json!({}))), Some("pong".to_string()))
            .on("pong", Arc::new(FixedStage::new("b", json!({}))), Some("ping".to_string()));

        assert!(matches!(
            events.dispatch("ping", &seattle()).await,
            Err(PipelineError::EventLoop { limit: 2, .. })
        ));
    }

    #[tokio::test]
    async fn failure_aborts_the_chain() {
        let analyze = Arc::new(FixedStage::failing("analyze_content", "youtube unhealthy"));
        let research = Arc::new(FixedStage::new("research_locations", json!({})));
        let mut events = EventOrchestrator::default();
        events
            .on("pipeline_start", analyze, Some("analysis_complete".to_string()))
            .on("analysis_complete", research.clone(), None);

        assert!(matches!(
            events.dispatch("pipeline_start", &seattle()).await,
            Err(PipelineError::StageFailed { .. })
        ));
        assert_eq!(research.runs(), 0);
    }

    #[tokio::test]
    async fn batch_reports_each_event_and_keeps_going() {
        let (events, stages) = chained();
        let batch = vec![
            BatchEvent {
                event_type: "video_uploaded".to_string(),
                input: seattle(),
            },
            BatchEvent {
                event_type: "pipeline_start".to_string(),
                input: seattle(),
            },
        ];

        let outcomes = events.process_batch(&batch).await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[0].status, BatchStatus::Error);
        assert!(outcomes[0].error.as_deref().unwrap().contains("video_uploaded"));
        assert_eq!(outcomes[1].status, BatchStatus::Success);
        assert_eq!(outcomes[1].run.as_ref().unwrap().results.len(), 3);
        assert_eq!(stages[0].runs(), 1);
    }

    #[test]
    fn batch_file_parses() {
        let batch: Vec<BatchEvent> = serde_json::from_str(
            r#"[{"event_type": "pipeline_start",
                 "input": {"content_ref": " abc123", "location": "Seattle, WA  ", "date": "2024-01-15",
                           "participants": [" a@example.com ", ""]}}]"#,
        )
        .unwrap();
        assert_eq!(batch[0].input.content_ref, "abc123");
        assert_eq!(batch[0].input.location, "Seattle, WA");
        assert_eq!(batch[0].input.participants, ["a@example.com"]);
    }
}
