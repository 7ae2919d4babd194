use crate::mcp::McpClient;
use crate::tools::check_required_args;
use crate::trace::{TraceCall, Tracer};
use crate::traits::{Tool, ToolResult};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// A single `(service, method)` pair exposed to agents as a tool named
/// `<service>_<method>`.
pub struct RemoteTool {
    name: String,
    method: String,
    description: String,
    schema: Value,
    client: Arc<McpClient>,
    tracer: Tracer,
}

impl RemoteTool {
    pub fn new(client: Arc<McpClient>, method: impl Into<String>) -> Self {
        let method = method.into();
        Self {
            name: format!("{}_{}", client.name(), method),
            description: format!("Call '{}' on the {} service", method, client.name()),
            schema: serde_json::json!({"type": "object", "properties": {}}),
            method,
            client,
            tracer: Tracer::disabled(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_tracer(mut self, tracer: Tracer) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.clone()
    }

    fn service(&self) -> Option<&str> {
        Some(self.client.name())
    }

    async fn execute(&self, args: Value) -> anyhow::Result<ToolResult> {
        let args = match check_required_args(&self.schema, args) {
            Ok(args) => args,
            Err(reason) => return Ok(ToolResult::error(reason)),
        };

        let call = TraceCall::tool(self.client.name(), &self.method)
            .with_inputs(Value::Object(args.clone()));

        match self
            .tracer
            .traced(call, self.client.run(&self.method, args))
            .await
        {
            Ok(body) => Ok(ToolResult::json(&body)),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubService;
    use crate::trace::{MemorySink, TraceStatus};
    use axum::http::StatusCode;
    use serde_json::json;

    fn route_schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "origin": {"type": "string"},
                "destination": {"type": "string"}
            },
            "required": ["origin", "destination"]
        })
    }

    #[tokio::test]
    async fn returns_body_and_records_trace() {
        let stub =
            StubService::spawn(|_| (StatusCode::OK, json!({"distance": "12.5 miles"}))).await;
        let sink = Arc::new(MemorySink::new());
        let tool = RemoteTool::new(Arc::new(McpClient::new("maps", &stub.base_url)), "route")
            .with_schema(route_schema())
            .with_tracer(Tracer::new(sink.clone()));

        assert_eq!(tool.name(), "maps_route");
        assert_eq!(tool.service(), Some("maps"));

        let result = tool
            .execute(json!({"origin": "Pike Place", "destination": "Space Needle"}))
            .await
            .unwrap();

        assert!(result.success);
        let body: Value = serde_json::from_str(&result.output).unwrap();
        assert_eq!(body["distance"], "12.5 miles");

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "mcp.maps.route");
        assert_eq!(records[0].inputs["origin"], "Pike Place");
        assert_eq!(records[0].status, TraceStatus::Success);
    }

    #[tokio::test]
    async fn missing_required_argument_never_reaches_service() {
        let stub = StubService::spawn(|_| (StatusCode::OK, json!({}))).await;
        let tool = RemoteTool::new(Arc::new(McpClient::new("maps", &stub.base_url)), "route")
            .with_schema(route_schema());

        let result = tool.execute(json!({"origin": "A"})).await.unwrap();

        assert!(!result.success);
        assert!(result.error_message().contains("destination"));
        assert_eq!(stub.run_hits(), 0);
    }

    #[tokio::test]
    async fn non_object_arguments_are_rejected() {
        let stub = StubService::spawn(|_| (StatusCode::OK, json!({}))).await;
        let tool = RemoteTool::new(Arc::new(McpClient::new("exa", &stub.base_url)), "search");

        let result = tool.execute(json!(["coffee"])).await.unwrap();
        assert!(!result.success);
        assert_eq!(stub.run_hits(), 0);
    }

    #[tokio::test]
    async fn service_failure_becomes_error_result_and_error_trace() {
        let stub =
            StubService::spawn(|_| (StatusCode::BAD_GATEWAY, json!({"detail": "upstream"}))).await;
        let sink = Arc::new(MemorySink::new());
        let tool = RemoteTool::new(Arc::new(McpClient::new("tts", &stub.base_url)), "generate_audio")
            .with_tracer(Tracer::new(sink.clone()));

        let result = tool.execute(json!({"text": "hello"})).await.unwrap();

        assert!(!result.success);
        assert!(result.error_message().contains("502"));
        assert_eq!(sink.records()[0].status, TraceStatus::Error);
    }
}
