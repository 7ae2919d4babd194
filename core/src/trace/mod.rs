//! Tracing wrapper applied around agent, stage and tool invocations.
//!
//! Every wrapped call produces exactly one [`TraceRecord`] carrying the
//! sanitized inputs, the sanitized output or the error text, the status and
//! the duration. Records go to the configured [`TraceSink`]; the call is also
//! instrumented with a `tracing` span so plain log output shows the same
//! structure.

pub mod sanitize;
pub mod sink;

pub use sanitize::{REDACTED, Sanitizer};
pub use sink::{FanoutSink, HttpSink, JsonlSink, MemorySink, create_tracer};

use crate::traits::TraceSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{Instrument, debug, warn};

pub const DEFAULT_PROJECT: &str = "roam-pipeline";

tokio::task_local! {
    static CURRENT_RUN: String;
}

/// Runs `fut` with `run_id` attached to every trace record emitted inside it.
pub async fn scope_run<F: Future>(run_id: String, fut: F) -> F::Output {
    CURRENT_RUN.scope(run_id, fut).await
}

pub fn current_run_id() -> Option<String> {
    CURRENT_RUN.try_with(|id| id.clone()).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceKind {
    Flow,
    Stage,
    Agent,
    Tool,
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flow => write!(f, "flow"),
            Self::Stage => write!(f, "stage"),
            Self::Agent => write!(f, "agent"),
            Self::Tool => write!(f, "mcp"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    pub project: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub name: String,
    pub kind: TraceKind,
    pub component: String,
    pub operation: String,
    pub inputs: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: TraceStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Describes one invocation about to be traced.
#[derive(Debug, Clone)]
pub struct TraceCall {
    kind: TraceKind,
    component: String,
    operation: String,
    inputs: Value,
}

impl TraceCall {
    pub fn new(kind: TraceKind, component: impl Into<String>, operation: impl Into<String>) -> Self {
        Self {
            kind,
            component: component.into(),
            operation: operation.into(),
            inputs: Value::Null,
        }
    }

    pub fn flow(name: impl Into<String>) -> Self {
        Self::new(TraceKind::Flow, name, "run")
    }

    pub fn stage(name: impl Into<String>) -> Self {
        Self::new(TraceKind::Stage, name, "run")
    }

    pub fn agent(name: impl Into<String>) -> Self {
        Self::new(TraceKind::Agent, name, "execute")
    }

    pub fn tool(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(TraceKind::Tool, service, method)
    }

    pub fn with_inputs(mut self, inputs: Value) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn name(&self) -> String {
        format!("{}.{}.{}", self.kind, self.component, self.operation)
    }
}

#[derive(Clone)]
pub struct Tracer {
    sink: Option<Arc<dyn TraceSink>>,
    sanitizer: Sanitizer,
    project: String,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::disabled()
    }
}

impl Tracer {
    pub fn new(sink: Arc<dyn TraceSink>) -> Self {
        Self {
            sink: Some(sink),
            sanitizer: Sanitizer::default(),
            project: DEFAULT_PROJECT.to_string(),
        }
    }

    /// A tracer that only emits log lines and records nothing.
    pub fn disabled() -> Self {
        Self {
            sink: None,
            sanitizer: Sanitizer::default(),
            project: DEFAULT_PROJECT.to_string(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.sink.is_some()
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub async fn traced<T, E, F>(&self, call: TraceCall, fut: F) -> Result<T, E>
    where
        T: Serialize,
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        let name = call.name();
        let run_id = current_run_id();
        let span = tracing::info_span!(
            "traced",
            name = %name,
            run_id = run_id.as_deref().unwrap_or("-")
        );

        let started_at = Utc::now();
        let start = Instant::now();
        let result = fut.instrument(span).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let error = result.as_ref().err().map(|e| format!("{e:#}"));
        match &error {
            None => debug!(name = %name, duration_ms, "call succeeded"),
            Some(error) => warn!(name = %name, duration_ms, error = %error, "call failed"),
        }

        if let Some(sink) = &self.sink {
            let (output, status) = match &result {
                Ok(value) => (
                    serde_json::to_value(value)
                        .ok()
                        .map(|v| self.sanitizer.sanitize(&v)),
                    TraceStatus::Success,
                ),
                Err(_) => (None, TraceStatus::Error),
            };

            let record = TraceRecord {
                project: self.project.clone(),
                run_id,
                name,
                kind: call.kind,
                component: call.component,
                operation: call.operation,
                inputs: self.sanitizer.sanitize(&call.inputs),
                output,
                error,
                status,
                started_at,
                duration_ms,
            };

            if let Err(e) = sink.record(&record).await {
                warn!(sink = sink.name(), error = %e, "failed to record trace");
            }
        }

        result
    }

    pub async fn flush(&self) {
        if let Some(sink) = &self.sink
            && let Err(e) = sink.flush().await
        {
            warn!(sink = sink.name(), error = %e, "failed to flush traces");
        }
    }
}
