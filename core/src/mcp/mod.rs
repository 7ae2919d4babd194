//! Client side of the tool adapter convention: every external service exposes
//! `GET /health` and `POST /mcp/run` taking `{"method", "args"}`.

pub mod client;
pub mod protocol;

pub use client::McpClient;
pub use protocol::{HEALTH_PATH, McpRequest, RUN_PATH};

use crate::config::Config;
use crate::error::ToolError;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One shared client per configured service.
#[derive(Clone, Default)]
pub struct McpServices {
    clients: BTreeMap<String, Arc<McpClient>>,
}

impl McpServices {
    pub fn from_config(config: &Config) -> Self {
        let clients = config
            .services
            .iter()
            .map(|(name, service)| {
                (
                    name.clone(),
                    Arc::new(McpClient::from_config(name.clone(), service)),
                )
            })
            .collect();
        Self { clients }
    }

    pub fn insert(&mut self, client: McpClient) {
        self.clients
            .insert(client.name().to_string(), Arc::new(client));
    }

    pub fn get(&self, name: &str) -> Option<Arc<McpClient>> {
        self.clients.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clients.keys().map(String::as_str)
    }

    /// Probes every service; the result is listed in name order.
    pub async fn check_all(&self) -> Vec<(String, Result<(), ToolError>)> {
        let mut results = Vec::with_capacity(self.clients.len());
        for (name, client) in &self.clients {
            results.push((name.clone(), client.health().await));
        }
        results
    }
}
