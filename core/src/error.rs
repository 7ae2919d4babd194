use thiserror::Error;

/// Failure of a single outbound call to an external service.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{service} service is unhealthy: {reason}")]
    Unhealthy { service: String, reason: String },

    #[error("{service}.{method} returned {status}: {body}")]
    Status {
        service: String,
        method: String,
        status: u16,
        body: String,
    },

    #[error("{service}.{method} timed out after {timeout_ms}ms")]
    Timeout {
        service: String,
        method: String,
        timeout_ms: u64,
    },

    #[error("{service}.{method} request failed: {source}")]
    Transport {
        service: String,
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service}.{method} returned a body that is not JSON: {reason}")]
    InvalidBody {
        service: String,
        method: String,
        reason: String,
    },
}

impl ToolError {
    pub fn service(&self) -> &str {
        match self {
            Self::Unhealthy { service, .. }
            | Self::Status { service, .. }
            | Self::Timeout { service, .. }
            | Self::Transport { service, .. }
            | Self::InvalidBody { service, .. } => service,
        }
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("tool '{tool}' is not in the capability set of agent '{agent}'")]
    ToolNotAllowed { agent: String, tool: String },

    #[error("invalid arguments for tool '{tool}': {reason}")]
    InvalidToolArguments { tool: String, reason: String },

    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("agent '{agent}' gave no final answer within {max} iterations")]
    MaxIterations { agent: String, max: usize },

    #[error("agent '{agent}' returned an empty response")]
    EmptyResponse { agent: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid pipeline input: {0}")]
    InvalidInput(String),

    #[error("stage '{stage}' expects keys {missing:?} missing from the output of '{upstream}'")]
    MalformedUpstream {
        stage: String,
        upstream: String,
        missing: Vec<String>,
    },

    #[error("stage {index} '{stage}' failed: {source:#}")]
    StageFailed {
        stage: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown stage '{0}'")]
    UnknownStage(String),

    #[error("no handler registered for event '{0}'")]
    UnknownEvent(String),

    #[error("event chain starting at '{start}' exceeded {limit} hops")]
    EventLoop { start: String, limit: usize },

    #[error("pipeline has no stages")]
    Empty,
}

impl PipelineError {
    /// Name of the stage the error is attributed to, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::MalformedUpstream { stage, .. } | Self::StageFailed { stage, .. } => Some(stage),
            Self::UnknownStage(stage) => Some(stage),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing base URL for service '{0}'")]
    MissingServiceUrl(String),

    #[error("invalid base URL for service '{service}': {url}")]
    InvalidServiceUrl { service: String, url: String },

    #[error("no API key found for provider '{provider}' (set one of {env_vars} or api_key in the config file)")]
    MissingApiKey { provider: String, env_vars: String },

    #[error("unknown provider '{0}'. Available: gemini, openai, ollama")]
    UnknownProvider(String),

    #[error("temperature {0} is outside 0.0..=2.0")]
    InvalidTemperature(f64),

    #[error("stage '{stage}' references unknown tool '{tool}'")]
    UnknownTool { stage: String, tool: String },

    #[error("stage '{0}' is defined more than once")]
    DuplicateStage(String),

    #[error("event '{event}' is handled by both '{first}' and '{second}'")]
    DuplicateEvent {
        event: String,
        first: String,
        second: String,
    },

    #[error("stage name '{0}' may only contain letters, digits, '_' and '-'")]
    InvalidStageName(String),
}
