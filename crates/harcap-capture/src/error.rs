//! Capture service errors.

use harcap_core::TargetId;

/// Errors surfaced by [`crate::CaptureService`].
///
/// Only session-fatal conditions appear here. Command failures and detach
/// races inside a running session degrade to no-ops by design and never
/// produce an error value.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// A start request arrived for a target that already has a live session.
    #[error("capture already in progress for target {target}")]
    CaptureInProgress {
        /// Target the rejected request named.
        target: TargetId,
    },

    /// Attaching the instrumentation channel failed; the session was
    /// discarded without retry.
    #[error("attach failed for target {target}: {message}")]
    AttachFailed {
        /// Target the attach was for.
        target: TargetId,
        /// Underlying failure description.
        message: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
