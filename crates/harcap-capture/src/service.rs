//! The capture coordinator: owns the store, drives the session state
//! machine, and pumps channel events into the accumulator.

use std::sync::Arc;

use metrics::{counter, gauge};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use harcap_core::{settings::CaptureSettings, CaptureId, CapturePhase, StatusUpdate, TargetId};

use crate::accumulator;
use crate::artifacts::ArtifactSink;
use crate::channel::DebuggerChannel;
use crate::error::CaptureError;
use crate::events::ChannelEvent;
use crate::export;
use crate::metrics::{
    ATTACH_FAILURES_TOTAL, CAPTURES_REJECTED_TOTAL, CAPTURES_STARTED_TOTAL, EVENTS_DISCARDED_TOTAL,
    EVENTS_FOLDED_TOTAL, SESSIONS_ACTIVE,
};
use crate::settle;
use crate::store::{SessionStore, SessionSummary};

/// Protocol domains enabled after a successful attach, in order.
const ENABLE_METHODS: &[&str] = &[
    "Network.enable",
    "Log.enable",
    "Page.enable",
    "Network.clearBrowserCache",
];

/// One-way progress text for whatever UI is listening.
///
/// Best-effort by construction: posting to a channel with no subscribers is
/// not an error and never touches session state.
#[derive(Debug, Clone)]
pub struct StatusNotifier {
    tx: broadcast::Sender<StatusUpdate>,
}

impl StatusNotifier {
    /// Create a notifier with the given broadcast capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to status updates.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StatusUpdate> {
        self.tx.subscribe()
    }

    /// Post a status line for a target.
    pub fn post(&self, target: &TargetId, text: &str) {
        tracing::debug!(target_id = %target, text, "status");
        let _ = self.tx.send(StatusUpdate::new(target.clone(), text));
    }
}

/// Coordinates capture sessions over one debugger channel.
pub struct CaptureService {
    channel: Arc<dyn DebuggerChannel>,
    store: Arc<SessionStore>,
    sink: Arc<dyn ArtifactSink>,
    status: StatusNotifier,
    settings: CaptureSettings,
}

impl CaptureService {
    /// Create a service over a channel and an artifact sink.
    pub fn new(
        channel: Arc<dyn DebuggerChannel>,
        sink: Arc<dyn ArtifactSink>,
        settings: CaptureSettings,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel,
            store: Arc::new(SessionStore::new()),
            sink,
            status: StatusNotifier::new(128),
            settings,
        })
    }

    /// Subscribe to one-way status updates.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<StatusUpdate> {
        self.status.subscribe()
    }

    /// Snapshot of all live sessions.
    #[must_use]
    pub fn sessions(&self) -> Vec<SessionSummary> {
        self.store.snapshot()
    }

    /// Start a capture for a target: create the session, attach, enable
    /// domains, force a clean reload.
    ///
    /// The session entry exists before the attach begins so no event can
    /// arrive for a session-less target. A start for a target with a live
    /// session is rejected; an attach failure removes the entry and is the
    /// only user-visible error.
    pub async fn start_capture(&self, target: &TargetId) -> Result<CaptureId, CaptureError> {
        let capture_id = self.store.insert_new(target).inspect_err(|_| {
            counter!(CAPTURES_REJECTED_TOTAL).increment(1);
        })?;
        counter!(CAPTURES_STARTED_TOTAL).increment(1);
        gauge!(SESSIONS_ACTIVE).increment(1.0);
        tracing::info!(target_id = %target, capture_id = %capture_id, "capture starting");

        let _ = self.store.set_phase(target, CapturePhase::Attaching);
        if let Err(error) = self.channel.attach(target).await {
            counter!(ATTACH_FAILURES_TOTAL).increment(1);
            self.status
                .post(target, &format!("Error: {}", error.message()));
            self.purge(target);
            return Err(CaptureError::AttachFailed {
                target: target.clone(),
                message: error.message().to_owned(),
            });
        }

        let _ = self.store.set_phase(target, CapturePhase::EnablingDomains);
        for method in ENABLE_METHODS {
            let _ = self
                .channel
                .send_command(target, method, serde_json::json!({}))
                .await;
        }
        let _ = self
            .channel
            .send_command(target, "Page.reload", serde_json::json!({ "ignoreCache": true }))
            .await;

        // The enable sequence is null-tolerant; only a detach during it
        // keeps the session out of the recording phase.
        if self.channel.is_attached(target) {
            let _ = self.store.set_phase(target, CapturePhase::Recording);
            self.status.post(target, "Recording...");
        }

        Ok(capture_id)
    }

    /// Spawn the event pump: folds channel events into sessions until the
    /// channel closes or `cancel` fires.
    pub fn spawn_event_pump(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let service = Arc::clone(self);
        let mut rx = self.channel.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    event = rx.recv() => match event {
                        Ok(event) => service.handle_event(event),
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            tracing::warn!(lagged = n, "event pump lagged, events lost");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            tracing::info!("channel event stream closed, pump exiting");
                            break;
                        }
                    },
                    () = cancel.cancelled() => {
                        tracing::info!("event pump cancelled");
                        break;
                    }
                }
            }
        })
    }

    /// Detach and purge every live session. Used at shutdown.
    pub async fn close_all(&self) {
        for target in self.store.targets() {
            self.channel.detach(&target).await;
            self.purge(&target);
        }
    }

    fn handle_event(self: &Arc<Self>, event: ChannelEvent) {
        if let ChannelEvent::Detached { target } = &event {
            tracing::debug!(target_id = %target, "channel detached");
            self.purge(target);
            return;
        }

        // The gate: a session must exist and the target must still be
        // attached, or the event is silently dropped. Detach races here are
        // expected, not errors.
        let target = event.target().clone();
        if !self.store.contains(&target) || !self.channel.is_attached(&target) {
            counter!(EVENTS_DISCARDED_TOTAL).increment(1);
            return;
        }

        if matches!(event, ChannelEvent::PageLoaded { .. }) {
            self.status.post(&target, "Processing...");
            self.arm_settle(&target);
            return;
        }

        if accumulator::fold(&self.store, &event) {
            counter!(EVENTS_FOLDED_TOTAL).increment(1);
        } else {
            counter!(EVENTS_DISCARDED_TOTAL).increment(1);
        }
    }

    fn arm_settle(self: &Arc<Self>, target: &TargetId) {
        let service = Arc::clone(self);
        let fire_target = target.clone();
        let armed = settle::arm(
            &self.store,
            target,
            self.settings.quiet_period(),
            move || async move {
                export::run_export(
                    service.channel.as_ref(),
                    &service.store,
                    service.sink.as_ref(),
                    &service.status,
                    &fire_target,
                )
                .await;
            },
        );
        if !armed {
            tracing::debug!(target_id = %target, "load signal coalesced");
        }
    }

    fn purge(&self, target: &TargetId) {
        if self.store.purge(target) {
            gauge!(SESSIONS_ACTIVE).decrement(1.0);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
