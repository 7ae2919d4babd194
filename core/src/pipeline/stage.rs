use crate::error::PipelineError;
use crate::pipeline::PipelineInput;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output of one stage in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageResult {
    pub stage: String,
    pub payload: Value,
    pub success: bool,
    pub duration_ms: u64,
}

impl StageResult {
    pub fn new(stage: impl Into<String>, payload: Value, duration_ms: u64) -> Self {
        Self {
            stage: stage.into(),
            payload: into_object(payload),
            success: true,
            duration_ms,
        }
    }
}

/// Non-object payloads are wrapped as `{"text": ...}`.
pub fn into_object(payload: Value) -> Value {
    match payload {
        Value::Object(_) => payload,
        Value::String(text) => serde_json::json!({ "text": text }),
        other => serde_json::json!({ "text": other.to_string() }),
    }
}

/// Everything a stage may read: the run input and the results before it.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub run_id: &'a str,
    pub input: &'a PipelineInput,
    pub previous: &'a [StageResult],
}

impl<'a> StageContext<'a> {
    pub fn new(run_id: &'a str, input: &'a PipelineInput, previous: &'a [StageResult]) -> Self {
        Self {
            run_id,
            input,
            previous,
        }
    }

    /// Result of the stage directly before this one.
    pub fn upstream(&self) -> Option<&'a StageResult> {
        self.previous.last()
    }

    pub fn result(&self, stage: &str) -> Option<&'a StageResult> {
        self.previous.iter().find(|r| r.stage == stage)
    }
}

/// Fails when the upstream payload lacks any of `required`. A stage with
/// requirements but no upstream reports every key missing.
pub fn check_upstream(
    stage: &str,
    required: &[String],
    upstream: Option<&StageResult>,
) -> Result<(), PipelineError> {
    if required.is_empty() {
        return Ok(());
    }

    let missing: Vec<String> = required
        .iter()
        .filter(|key| {
            upstream
                .and_then(|r| r.payload.get(key.as_str()))
                .is_none_or(Value::is_null)
        })
        .cloned()
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::MalformedUpstream {
            stage: stage.to_string(),
            upstream: upstream.map_or_else(|| "<none>".to_string(), |r| r.stage.clone()),
            missing,
        })
    }
}
