//! Test doubles for route and stream tests.

use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusBuilder;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use harcap_capture::channel::{AttachError, DebuggerChannel};
use harcap_capture::{ArtifactSink, CaptureService, ChannelEvent};
use harcap_cdp::DevToolsEndpoint;
use harcap_core::settings::{CaptureSettings, ServerSettings};
use harcap_core::TargetId;

use crate::CaptureServer;

/// Channel stub: attach tracking only, every command answers `None`.
struct StubChannel {
    fail_attach: bool,
    attached: Mutex<HashSet<TargetId>>,
    events: broadcast::Sender<ChannelEvent>,
}

#[async_trait]
impl DebuggerChannel for StubChannel {
    async fn attach(&self, target: &TargetId) -> Result<(), AttachError> {
        if self.fail_attach {
            return Err(AttachError::new("no such target"));
        }
        let _ = self.attached.lock().insert(target.clone());
        Ok(())
    }

    async fn send_command(&self, _target: &TargetId, _method: &str, _params: Value) -> Option<Value> {
        None
    }

    async fn detach(&self, target: &TargetId) {
        let _ = self.attached.lock().remove(target);
    }

    fn is_attached(&self, target: &TargetId) -> bool {
        self.attached.lock().contains(target)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

/// Sink that discards everything. Route tests never reach an export.
struct NullSink;

#[async_trait]
impl ArtifactSink for NullSink {
    async fn deliver(&self, filename: &str, _contents: &[u8]) -> io::Result<PathBuf> {
        Ok(PathBuf::from(filename))
    }
}

/// A server over a stub channel and an endpoint nothing listens on.
pub(crate) fn test_server(fail_attach: bool) -> CaptureServer {
    let (events, _) = broadcast::channel(16);
    let channel = Arc::new(StubChannel {
        fail_attach,
        attached: Mutex::new(HashSet::new()),
        events,
    });
    let service = CaptureService::new(channel, Arc::new(NullSink), CaptureSettings::default());
    CaptureServer::new(
        ServerSettings::default(),
        service,
        DevToolsEndpoint::new("127.0.0.1", 9),
        PrometheusBuilder::new().build_recorder().handle(),
    )
}
