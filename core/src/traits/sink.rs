use crate::trace::TraceRecord;
use async_trait::async_trait;

/// Destination for trace records produced by the tracing wrapper.
#[async_trait]
pub trait TraceSink: Send + Sync {
    fn name(&self) -> &str;

    async fn record(&self, record: &TraceRecord) -> anyhow::Result<()>;

    async fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
