//! Route error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use harcap_capture::CaptureError;

/// Errors a route can surface to the client.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The capture service rejected or failed the request.
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// The browser endpoint could not be queried.
    #[error("browser endpoint unavailable: {0}")]
    Discovery(String),
}

impl ServerError {
    /// HTTP status for this error.
    ///
    /// A start for a target with a live session is a conflict; everything
    /// that depends on the browser side answering is a bad gateway.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Capture(CaptureError::CaptureInProgress { .. }) => StatusCode::CONFLICT,
            Self::Capture(CaptureError::AttachFailed { .. }) | Self::Discovery(_) => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::debug!(%status, error = %self, "request failed");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
