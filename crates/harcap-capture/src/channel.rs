//! The instrumentation channel seam.
//!
//! [`DebuggerChannel`] is everything the capture machine needs from a
//! protocol backend. The contract is built around detach races: commands
//! resolve to `None` instead of failing once a target is gone, and the
//! attached set the implementation maintains is the authoritative gate the
//! rest of the pipeline re-checks before every side effect.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use harcap_core::TargetId;

use crate::events::ChannelEvent;

/// Failure to attach the channel to a target.
///
/// The only channel failure that surfaces to users; everything after a
/// successful attach degrades to `None` results instead.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct AttachError {
    message: String,
}

impl AttachError {
    /// Build an attach error from a failure description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The failure description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Protocol backend for one or more attachable targets.
#[async_trait]
pub trait DebuggerChannel: Send + Sync {
    /// Attach to a target. Idempotent per target: attaching to an
    /// already-attached target succeeds without side effects. On failure
    /// the target is not in the attached set and no events will follow.
    async fn attach(&self, target: &TargetId) -> Result<(), AttachError>;

    /// Send a protocol command and await its result.
    ///
    /// Resolves to `None` rather than erroring or hanging when the target
    /// is not attached, when the command fails, or when the target
    /// detaches mid-call. Callers treat `None` as "skip this step,
    /// continue".
    async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Option<Value>;

    /// Detach from a target. Best-effort: failures are swallowed, and the
    /// target leaves the attached set regardless.
    async fn detach(&self, target: &TargetId);

    /// Whether the target is currently in the attached set. This is the
    /// gate every side-effecting step re-checks immediately before acting.
    fn is_attached(&self, target: &TargetId) -> bool;

    /// Subscribe to the event stream for all attached targets.
    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent>;
}
