//! CDP backend errors.

use harcap_core::TargetId;
use thiserror::Error;

/// Errors from the DevTools endpoint, target attach, and Chrome launch.
///
/// Only the attach path surfaces these to callers; established sessions
/// degrade to `None` command results instead of erroring.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The DevTools endpoint does not list this target.
    #[error("no debuggable target '{target}'")]
    TargetNotFound {
        /// The target that was requested.
        target: TargetId,
    },

    /// The listed target carries no WebSocket debugger URL (usually
    /// because another client is already attached).
    #[error("target '{target}' is not attachable (no debugger URL)")]
    NotAttachable {
        /// The target in question.
        target: TargetId,
    },

    /// DevTools HTTP endpoint request failed.
    #[error("DevTools endpoint error: {0}")]
    Http(#[from] reqwest::Error),

    /// WebSocket connect or handshake failed.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Chrome executable not found on the system.
    #[error("Chrome not found; install Chrome/Chromium or set CHROME_PATH")]
    ChromeNotFound,

    /// Failed to launch the Chrome browser process.
    #[error("failed to launch browser: {context}")]
    LaunchFailed {
        /// What went wrong during launch.
        context: String,
    },

    /// Waited too long for the endpoint to become ready.
    #[error("timed out after {timeout_ms}ms: {context}")]
    Timeout {
        /// How long we waited.
        timeout_ms: u64,
        /// What we were waiting for.
        context: String,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
