use crate::config::TraceConfig;
use crate::trace::{Sanitizer, TraceRecord, Tracer};
use crate::traits::TraceSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

/// Keeps records in process. Used by tests and by the CLI run summary.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<TraceRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<TraceRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TraceSink for MemorySink {
    fn name(&self) -> &str {
        "memory"
    }

    async fn record(&self, record: &TraceRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(record.clone());
        Ok(())
    }
}

/// Appends one JSON document per line to a file.
pub struct JsonlSink {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TraceSink for JsonlSink {
    fn name(&self) -> &str {
        "jsonl"
    }

    async fn record(&self, record: &TraceRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| format!("Failed to open trace file {}", self.path.display()))?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

/// Posts each record to a remote observability endpoint.
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpSink {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }
}

#[async_trait]
impl TraceSink for HttpSink {
    fn name(&self) -> &str {
        "http"
    }

    async fn record(&self, record: &TraceRecord) -> Result<()> {
        let mut request = self.client.post(&self.endpoint).json(record);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "Trace endpoint {} returned {}",
                self.endpoint,
                response.status()
            );
        }
        Ok(())
    }
}

/// Sends every record to each inner sink; one failing sink does not stop the others.
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TraceSink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn TraceSink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl TraceSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn record(&self, record: &TraceRecord) -> Result<()> {
        let mut failures = vec![];
        for sink in &self.sinks {
            if let Err(e) = sink.record(record).await {
                failures.push(format!("{}: {}", sink.name(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(anyhow::anyhow!("{}", failures.join("; ")))
        }
    }

    async fn flush(&self) -> Result<()> {
        for sink in &self.sinks {
            sink.flush().await?;
        }
        Ok(())
    }
}

/// Builds the tracer described by `config`. Relative trace file paths are
/// resolved against `base_dir`. `extra` sinks are always attached.
pub fn create_tracer(
    config: &TraceConfig,
    base_dir: &Path,
    extra: Vec<Arc<dyn TraceSink>>,
) -> Tracer {
    if !config.enabled {
        return Tracer::disabled();
    }

    let mut sinks = extra;

    if let Some(file) = &config.file {
        let path = if file.is_absolute() {
            file.clone()
        } else {
            base_dir.join(file)
        };
        sinks.push(Arc::new(JsonlSink::new(path)));
    }

    if let Some(endpoint) = config.endpoint.as_ref().filter(|e| !e.is_empty()) {
        sinks.push(Arc::new(
            HttpSink::new(endpoint.clone()).with_api_key(config.api_key.clone()),
        ));
    }

    let sink: Arc<dyn TraceSink> = match sinks.len() {
        0 => return Tracer::disabled(),
        1 => sinks.remove(0),
        _ => Arc::new(FanoutSink::new(sinks)),
    };

    let sanitizer = Sanitizer::new(config.max_string_length, config.max_list_items)
        .with_redaction(config.sanitize);

    Tracer::new(sink)
        .with_sanitizer(sanitizer)
        .with_project(config.project.clone())
}
