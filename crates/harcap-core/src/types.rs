//! Session lifecycle vocabulary and progress notifications.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::TargetId;

/// Lifecycle phase of one capture session.
///
/// Transitions run strictly forward:
/// `Idle → Attaching → EnablingDomains → Recording → Exporting → Closed`.
/// A session may jump to `Closed` from any phase when its target detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CapturePhase {
    /// Session object exists but the attach sequence has not started.
    Idle,
    /// Instrumentation channel attach is in flight.
    Attaching,
    /// Protocol domains are being enabled and the reload issued.
    EnablingDomains,
    /// Events are being folded into records.
    Recording,
    /// The settle timer fired; bodies are being harvested and artifacts
    /// serialized.
    Exporting,
    /// Terminal. The session is about to be purged from the store.
    Closed,
}

impl CapturePhase {
    /// Whether the session has reached its terminal phase.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for CapturePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Attaching => "attaching",
            Self::EnablingDomains => "enabling-domains",
            Self::Recording => "recording",
            Self::Exporting => "exporting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// One-way progress notification for whatever UI is listening.
///
/// Delivery is best-effort: sessions never block on, or fail because of,
/// status delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    /// Target the notification concerns.
    pub target: TargetId,
    /// Human-readable status line (e.g. `Recording...`, `Done!`).
    pub text: String,
}

impl StatusUpdate {
    /// Build a status update for a target.
    #[must_use]
    pub fn new(target: TargetId, text: impl Into<String>) -> Self {
        Self {
            target,
            text: text.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_display_names() {
        assert_eq!(CapturePhase::Idle.to_string(), "idle");
        assert_eq!(CapturePhase::EnablingDomains.to_string(), "enabling-domains");
        assert_eq!(CapturePhase::Closed.to_string(), "closed");
    }

    #[test]
    fn only_closed_is_terminal() {
        assert!(CapturePhase::Closed.is_terminal());
        assert!(!CapturePhase::Idle.is_terminal());
        assert!(!CapturePhase::Recording.is_terminal());
        assert!(!CapturePhase::Exporting.is_terminal());
    }

    #[test]
    fn phase_serializes_kebab_case() {
        let json = serde_json::to_string(&CapturePhase::EnablingDomains).unwrap();
        assert_eq!(json, "\"enabling-domains\"");
    }

    #[test]
    fn status_update_serializes_camel_case() {
        let update = StatusUpdate::new("t1".into(), "Recording...");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["target"], "t1");
        assert_eq!(json["text"], "Recording...");
    }
}
