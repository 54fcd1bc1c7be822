//! Settle timer: per-session debounce between the page-load signal and the
//! export.
//!
//! At most one timer per session. Coalescing lives in the session's
//! timer-handle slot: arming while a timer is pending is a no-op. The
//! spawned task selects between the quiet-interval sleep and the session's
//! cancellation token, so a purge cancels a pending timer without aborting
//! anything mid-export. Cancellation and firing can still race; the
//! exporter's own attachment check is what actually prevents a post-detach
//! export.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use harcap_core::TargetId;

use crate::store::SessionStore;

/// Arm the settle timer for a target, invoking `on_fire` after the quiet
/// interval elapses uncancelled.
///
/// Returns `false` when no timer was armed: either the session does not
/// exist, or one is already pending (coalesced).
pub fn arm<F, Fut>(
    store: &Arc<SessionStore>,
    target: &TargetId,
    quiet_period: Duration,
    on_fire: F,
) -> bool
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    let token = store.with_session(target, |session| {
        if session.settle.is_some() {
            None
        } else {
            Some(session.cancel.clone())
        }
    });
    let Some(Some(token)) = token else {
        tracing::debug!(target_id = %target, "settle timer not armed (absent or pending)");
        return false;
    };

    let store_for_task = Arc::clone(store);
    let target_for_task = target.clone();
    let handle = tokio::spawn(async move {
        tokio::select! {
            () = tokio::time::sleep(quiet_period) => {
                // Clear the handle slot before exporting so a load signal
                // arriving during the export can arm a fresh timer.
                let _ = store_for_task
                    .with_session(&target_for_task, |session| session.settle = None);
                tracing::debug!(target_id = %target_for_task, "settle timer fired");
                on_fire().await;
            }
            () = token.cancelled() => {
                tracing::debug!(target_id = %target_for_task, "settle timer cancelled");
            }
        }
    });

    let stored = store.with_session(target, |session| session.settle = Some(handle));
    if stored.is_none() {
        // The session vanished between the check and the insert; the purge
        // already cancelled the token, so the task exits on its own.
        return false;
    }
    true
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
