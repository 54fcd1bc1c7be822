//! Session store: the single source of truth for capture state.
//!
//! One [`CaptureSession`] per target, keyed by target ID. The store is
//! owned by the [`crate::CaptureService`] coordinator and handed around by
//! reference; nothing here is global. Map guards are short-lived and never
//! held across an await point.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use harcap_core::{CaptureId, CapturePhase, NetworkRecord, RequestId, TargetId};

use crate::error::CaptureError;

/// State of one capture session.
#[derive(Debug)]
pub struct CaptureSession {
    /// Locally minted identifier for log correlation.
    pub capture_id: CaptureId,
    /// Target this session captures.
    pub target: TargetId,
    /// Lifecycle phase.
    pub phase: CapturePhase,
    /// Accumulated network records, keyed by request identifier.
    pub network: HashMap<RequestId, NetworkRecord>,
    /// Accumulated console lines, in arrival order.
    pub console: Vec<String>,
    /// Cancelled when the session is purged; settle timers select on it.
    pub cancel: CancellationToken,
    /// Handle of the pending settle timer, when one is armed.
    pub settle: Option<JoinHandle<()>>,
    /// Session creation instant.
    pub created_at: DateTime<Utc>,
}

impl CaptureSession {
    fn new(target: TargetId) -> Self {
        Self {
            capture_id: CaptureId::new(),
            target,
            phase: CapturePhase::Idle,
            network: HashMap::new(),
            console: Vec::new(),
            cancel: CancellationToken::new(),
            settle: None,
            created_at: Utc::now(),
        }
    }
}

/// Read-only snapshot of one session, for the control surface.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    /// Target being captured.
    pub target: TargetId,
    /// Capture identifier.
    pub capture_id: CaptureId,
    /// Current lifecycle phase.
    pub phase: CapturePhase,
    /// Number of network records accumulated so far.
    pub network_records: usize,
    /// Number of console lines accumulated so far.
    pub console_lines: usize,
    /// Session creation instant.
    pub created_at: DateTime<Utc>,
}

/// Keyed collection of active capture sessions.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<TargetId, CaptureSession>,
}

impl SessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for a target, rejecting the request if one already
    /// exists. Returns the new session's capture ID.
    pub fn insert_new(&self, target: &TargetId) -> Result<CaptureId, CaptureError> {
        match self.sessions.entry(target.clone()) {
            Entry::Occupied(_) => Err(CaptureError::CaptureInProgress {
                target: target.clone(),
            }),
            Entry::Vacant(entry) => {
                let session = CaptureSession::new(target.clone());
                let capture_id = session.capture_id.clone();
                let _ = entry.insert(session);
                Ok(capture_id)
            }
        }
    }

    /// Whether a session exists for the target.
    #[must_use]
    pub fn contains(&self, target: &TargetId) -> bool {
        self.sessions.contains_key(target)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// All targets with a live session.
    #[must_use]
    pub fn targets(&self) -> Vec<TargetId> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    /// Run a closure against the session for a target, if one exists.
    ///
    /// The map guard lives only for the closure; callers must not await
    /// inside it.
    pub fn with_session<R>(
        &self,
        target: &TargetId,
        f: impl FnOnce(&mut CaptureSession) -> R,
    ) -> Option<R> {
        self.sessions.get_mut(target).map(|mut entry| f(&mut entry))
    }

    /// Current phase of a target's session.
    #[must_use]
    pub fn phase(&self, target: &TargetId) -> Option<CapturePhase> {
        self.sessions.get(target).map(|s| s.phase)
    }

    /// Advance a session's phase, logging the transition. Returns false if
    /// no session exists.
    pub fn set_phase(&self, target: &TargetId, phase: CapturePhase) -> bool {
        self.with_session(target, |session| {
            tracing::debug!(
                target_id = %target,
                capture_id = %session.capture_id,
                from = %session.phase,
                to = %phase,
                "capture phase transition"
            );
            session.phase = phase;
        })
        .is_some()
    }

    /// Clone the cancellation token of a target's session.
    #[must_use]
    pub fn cancellation_token(&self, target: &TargetId) -> Option<CancellationToken> {
        self.sessions.get(target).map(|s| s.cancel.clone())
    }

    /// Remove a target's session, cancelling its token and aborting any
    /// pending settle timer. Returns false if no session existed.
    pub fn purge(&self, target: &TargetId) -> bool {
        if let Some((_, mut session)) = self.sessions.remove(target) {
            session.phase = CapturePhase::Closed;
            session.cancel.cancel();
            if let Some(handle) = session.settle.take() {
                handle.abort();
            }
            tracing::debug!(
                target_id = %target,
                capture_id = %session.capture_id,
                "capture session purged"
            );
            true
        } else {
            false
        }
    }

    /// Snapshot all live sessions for the control surface.
    #[must_use]
    pub fn snapshot(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| SessionSummary {
                target: entry.target.clone(),
                capture_id: entry.capture_id.clone(),
                phase: entry.phase,
                network_records: entry.network.len(),
                console_lines: entry.console.len(),
                created_at: entry.created_at,
            })
            .collect();
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
