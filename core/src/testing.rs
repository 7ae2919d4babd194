//! In-process fakes shared by the unit tests: an axum stub of a tool service,
//! a scripted reasoning provider, a canned tool and a fixed stage.

use crate::pipeline::StageContext;
use crate::traits::{
    ChatMessage, ChatRequest, ChatResponse, Provider, Stage, Tool, ToolCall, ToolResult,
};
use async_trait::async_trait;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Reply = Arc<dyn Fn(&Value) -> (StatusCode, Value) + Send + Sync>;

#[derive(Clone)]
struct StubState {
    health: StatusCode,
    health_body: Value,
    raw_body: Option<String>,
    delay: Duration,
    reply: Reply,
    run_hits: Arc<AtomicUsize>,
    health_hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<Value>>>,
    authorization: Arc<Mutex<Option<String>>>,
}

async fn health(State(state): State<StubState>) -> (StatusCode, Json<Value>) {
    state.health_hits.fetch_add(1, Ordering::SeqCst);
    (state.health, Json(state.health_body.clone()))
}

async fn run(
    State(state): State<StubState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.run_hits.fetch_add(1, Ordering::SeqCst);
    *state.authorization.lock().unwrap() = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    state.requests.lock().unwrap().push(body.clone());

    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if let Some(raw) = &state.raw_body {
        return (StatusCode::OK, raw.clone()).into_response();
    }

    let (status, value) = (state.reply)(&body);
    (status, Json(value)).into_response()
}

pub struct StubBuilder {
    health: StatusCode,
    health_body: Value,
    raw_body: Option<String>,
    delay: Duration,
}

impl StubBuilder {
    pub fn health(mut self, status: StatusCode) -> Self {
        self.health = status;
        self
    }

    pub fn health_body(mut self, body: Value) -> Self {
        self.health_body = body;
        self
    }

    pub fn raw_body(mut self, body: &str) -> Self {
        self.raw_body = Some(body.to_string());
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub async fn spawn<F>(self, reply: F) -> StubService
    where
        F: Fn(&Value) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        let state = StubState {
            health: self.health,
            health_body: self.health_body,
            raw_body: self.raw_body,
            delay: self.delay,
            reply: Arc::new(reply),
            run_hits: Arc::new(AtomicUsize::new(0)),
            health_hits: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(vec![])),
            authorization: Arc::new(Mutex::new(None)),
        };

        let app = Router::new()
            .route("/health", get(health))
            .route("/mcp/run", post(run))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        StubService {
            base_url: format!("http://{addr}"),
            state,
        }
    }
}

/// A running stub of one tool service.
pub struct StubService {
    pub base_url: String,
    state: StubState,
}

impl StubService {
    pub fn builder() -> StubBuilder {
        StubBuilder {
            health: StatusCode::OK,
            health_body: json!({"status": "ok"}),
            raw_body: None,
            delay: Duration::ZERO,
        }
    }

    pub async fn spawn<F>(reply: F) -> StubService
    where
        F: Fn(&Value) -> (StatusCode, Value) + Send + Sync + 'static,
    {
        Self::builder().spawn(reply).await
    }

    pub fn run_hits(&self) -> usize {
        self.state.run_hits.load(Ordering::SeqCst)
    }

    pub fn health_hits(&self) -> usize {
        self.state.health_hits.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn authorization(&self) -> Option<String> {
        self.state.authorization.lock().unwrap().clone()
    }
}

/// Base URL of a port nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// Provider answering from a fixed script, recording every request it sees.
#[derive(Default)]
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<ChatResponse>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            seen: Mutex::new(vec![]),
        }
    }

    /// Answers every request with the same text.
    pub fn repeating(text: &str, times: usize) -> Self {
        Self::new((0..times).map(|_| ChatResponse::text(text)).collect())
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-model"
    }

    async fn chat(&self, request: ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        self.seen.lock().unwrap().push(request.messages.to_vec());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("script exhausted"))
    }
}

pub fn tool_call(id: &str, name: &str, arguments: Value) -> ChatResponse {
    ChatResponse {
        text: None,
        tool_calls: vec![ToolCall {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }],
    }
}

/// Tool returning a fixed result and counting its invocations.
pub struct CannedTool {
    name: String,
    result: ToolResult,
    calls: AtomicUsize,
}

impl CannedTool {
    pub fn new(name: &str, result: ToolResult) -> Self {
        Self {
            name: name.to_string(),
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for CannedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "canned tool"
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        })
    }

    async fn execute(&self, _args: Value) -> anyhow::Result<ToolResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.result.clone())
    }
}

enum StageBehavior {
    Fixed(Value),
    Fail(String),
    EchoLocation,
}

/// Stage with a predetermined outcome that counts how often it ran.
pub struct FixedStage {
    name: String,
    requires: Vec<String>,
    behavior: StageBehavior,
    runs: AtomicUsize,
}

impl FixedStage {
    fn with_behavior(name: &str, behavior: StageBehavior) -> Self {
        Self {
            name: name.to_string(),
            requires: vec![],
            behavior,
            runs: AtomicUsize::new(0),
        }
    }

    pub fn new(name: &str, payload: Value) -> Self {
        Self::with_behavior(name, StageBehavior::Fixed(payload))
    }

    pub fn failing(name: &str, message: &str) -> Self {
        Self::with_behavior(name, StageBehavior::Fail(message.to_string()))
    }

    /// Answers with the run location and the name of its upstream stage.
    pub fn echo_location(name: &str) -> Self {
        Self::with_behavior(name, StageBehavior::EchoLocation)
    }

    pub fn with_requires(mut self, keys: &[&str]) -> Self {
        self.requires = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Stage for FixedStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn requires(&self) -> &[String] {
        &self.requires
    }

    async fn run(&self, ctx: &StageContext<'_>) -> anyhow::Result<Value> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            StageBehavior::Fixed(payload) => Ok(payload.clone()),
            StageBehavior::Fail(message) => Err(anyhow::anyhow!("{message}")),
            StageBehavior::EchoLocation => Ok(json!({
                "location": ctx.input.location,
                "upstream": ctx.upstream().map(|r| r.stage.clone()),
            })),
        }
    }
}
