//! Stages, the orchestrators that sequence them and the roster that
//! declares them.

pub mod agent_stage;
pub mod events;
pub mod input;
pub mod orchestrator;
pub mod roster;
pub mod stage;

pub use agent_stage::AgentStage;
pub use events::{BatchEvent, BatchOutcome, BatchStatus, EventOrchestrator};
pub use input::PipelineInput;
pub use orchestrator::{Orchestrator, new_run_id};
pub use roster::{Roster, StageFactory, StageSpec};
pub use stage::{StageContext, StageResult, check_upstream};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The full chain of results of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub input: PipelineInput,
    pub results: Vec<StageResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl PipelineRun {
    pub fn result(&self, stage: &str) -> Option<&StageResult> {
        self.results.iter().find(|r| r.stage == stage)
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }
}
