use crate::pipeline::StageContext;
use async_trait::async_trait;

/// One step of a pipeline. A stage reads the run input and the results of the
/// stages before it and produces a JSON object payload.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &str;

    /// Keys this stage needs in the payload of the stage directly before it.
    fn requires(&self) -> &[String] {
        &[]
    }

    async fn run(&self, ctx: &StageContext<'_>) -> anyhow::Result<serde_json::Value>;
}
