//! DevTools HTTP endpoint client: target discovery and readiness probing.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use harcap_core::TargetId;

use crate::error::ChannelError;

/// Poll interval while waiting for the endpoint to come up.
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One debuggable target as listed by `/json/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    /// Protocol target identifier.
    pub id: String,
    /// Page title.
    #[serde(default)]
    pub title: String,
    /// Current URL.
    #[serde(default)]
    pub url: String,
    /// Target kind (`page`, `iframe`, `service_worker`, …).
    #[serde(rename = "type", default)]
    pub target_type: String,
    /// Per-target WebSocket URL; absent when another client is attached.
    #[serde(default)]
    pub web_socket_debugger_url: Option<String>,
}

impl TargetDescriptor {
    /// Whether this is a top-level page target.
    #[must_use]
    pub fn is_page(&self) -> bool {
        self.target_type == "page"
    }
}

/// Client for one browser's DevTools HTTP endpoint.
#[derive(Debug, Clone)]
pub struct DevToolsEndpoint {
    base_url: String,
    client: reqwest::Client,
}

impl DevToolsEndpoint {
    /// Endpoint at `http://{host}:{port}`.
    #[must_use]
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            base_url: format!("http://{host}:{port}"),
            client: reqwest::Client::new(),
        }
    }

    /// The endpoint base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List all debuggable targets (`/json/list`).
    pub async fn targets(&self) -> Result<Vec<TargetDescriptor>, ChannelError> {
        let url = format!("{}/json/list", self.base_url);
        let targets = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<TargetDescriptor>>()
            .await?;
        Ok(targets)
    }

    /// Browser metadata (`/json/version`); doubles as a liveness probe.
    pub async fn version(&self) -> Result<Value, ChannelError> {
        let url = format!("{}/json/version", self.base_url);
        let version = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        Ok(version)
    }

    /// Find one target by identifier and return its WebSocket URL.
    pub async fn resolve_ws_url(&self, target: &TargetId) -> Result<String, ChannelError> {
        let descriptor = self
            .targets()
            .await?
            .into_iter()
            .find(|t| t.id == target.as_str())
            .ok_or_else(|| ChannelError::TargetNotFound {
                target: target.clone(),
            })?;
        descriptor
            .web_socket_debugger_url
            .ok_or_else(|| ChannelError::NotAttachable {
                target: target.clone(),
            })
    }

    /// Poll `/json/version` until the endpoint answers or the timeout
    /// elapses.
    pub async fn wait_until_ready(&self, timeout: Duration) -> Result<(), ChannelError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.version().await.is_ok() {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                #[allow(clippy::cast_possible_truncation)]
                return Err(ChannelError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                    context: format!("DevTools endpoint at {}", self.base_url),
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
