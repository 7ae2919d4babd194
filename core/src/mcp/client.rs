use crate::config::ServiceConfig;
use crate::error::ToolError;
use crate::mcp::{HEALTH_PATH, McpRequest, RUN_PATH};
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Client for one external service speaking the `/mcp/run` convention.
///
/// Before the first call the service's `/health` endpoint is probed. A healthy
/// answer is remembered for the lifetime of the client; an unhealthy one is not,
/// so every call keeps failing with [`ToolError::Unhealthy`] until the service
/// recovers.
pub struct McpClient {
    name: String,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    health_gate: bool,
    healthy: OnceCell<()>,
    client: reqwest::Client,
}

impl McpClient {
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            health_gate: true,
            healthy: OnceCell::new(),
            client,
        }
    }

    pub fn from_config(name: impl Into<String>, config: &ServiceConfig) -> Self {
        Self::new(name, config.base_url.trim())
            .with_api_key(config.api_key.clone().unwrap_or_default())
            .with_timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .with_health_gate(config.health_gate)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let api_key = api_key.into();
        self.api_key = (!api_key.is_empty()).then_some(api_key);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_gate(mut self, enabled: bool) -> Self {
        self.health_gate = enabled;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<(), ToolError> {
        let unhealthy = |reason: String| ToolError::Unhealthy {
            service: self.name.clone(),
            reason,
        };

        let response = self
            .client
            .get(format!("{}{}", self.base_url, HEALTH_PATH))
            .timeout(self.timeout.min(HEALTH_TIMEOUT))
            .send()
            .await
            .map_err(|e| unhealthy(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(unhealthy(format!("health check returned {status}")));
        }

        // A 2xx answer may still report a degraded state in its body.
        let body = response.text().await.unwrap_or_default();
        if let Ok(value) = serde_json::from_str::<Value>(&body)
            && let Some(reported) = value.get("status").and_then(Value::as_str)
            && !matches!(reported.to_lowercase().as_str(), "ok" | "healthy" | "up")
        {
            return Err(unhealthy(format!("service reports status '{reported}'")));
        }

        Ok(())
    }

    async fn ensure_healthy(&self) -> Result<(), ToolError> {
        if !self.health_gate {
            return Ok(());
        }

        self.healthy
            .get_or_try_init(|| async {
                self.health().await?;
                info!(service = %self.name, "service healthy");
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Performs one `POST /mcp/run` call and returns the JSON body.
    pub async fn run(&self, method: &str, args: Map<String, Value>) -> Result<Value, ToolError> {
        self.ensure_healthy().await?;

        let body = McpRequest::new(method, args);
        let mut request = self
            .client
            .post(format!("{}{}", self.base_url, RUN_PATH))
            .timeout(self.timeout)
            .json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        debug!(service = %self.name, method, "calling service");

        let response = request.send().await.map_err(|e| self.transport_error(method, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(method, e))?;

        if !status.is_success() {
            return Err(ToolError::Status {
                service: self.name.clone(),
                method: method.to_string(),
                status: status.as_u16(),
                body: truncate(&text, MAX_ERROR_BODY_CHARS),
            });
        }

        serde_json::from_str(&text).map_err(|e| ToolError::InvalidBody {
            service: self.name.clone(),
            method: method.to_string(),
            reason: e.to_string(),
        })
    }

    fn transport_error(&self, method: &str, error: reqwest::Error) -> ToolError {
        if error.is_timeout() {
            ToolError::Timeout {
                service: self.name.clone(),
                method: method.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            ToolError::Transport {
                service: self.name.clone(),
                method: method.to_string(),
                source: error,
            }
        }
    }
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        format!("{}...", text.chars().take(max).collect::<String>())
    } else {
        text.to_string()
    }
}
