//! Route table and HTTP handlers.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use harcap_capture::SessionSummary;
use harcap_cdp::TargetDescriptor;
use harcap_core::{CaptureId, TargetId};

use crate::error::ServerError;
use crate::server::AppState;
use crate::ws;

/// Build the router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_text))
        .route("/api/captures", get(list_captures).post(start_capture))
        .route("/api/targets", get(list_targets))
        .route("/ws/status", get(ws::status_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// `POST /api/captures` body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCaptureRequest {
    /// Target to capture.
    pub target_id: TargetId,
}

/// `POST /api/captures` success body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartCaptureResponse {
    /// Identifier minted for this capture.
    pub capture_id: CaptureId,
    /// Target being captured.
    pub target_id: TargetId,
}

/// `GET /health` body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Always `ok` when the server answers at all.
    pub status: &'static str,
    /// Seconds since startup.
    pub uptime_secs: u64,
    /// Live capture sessions.
    pub active_sessions: usize,
}

/// `POST /api/captures` — start a capture. Accepted (202) means recording
/// is underway; the outcome arrives over the status stream.
async fn start_capture(
    State(state): State<AppState>,
    Json(req): Json<StartCaptureRequest>,
) -> Result<(StatusCode, Json<StartCaptureResponse>), ServerError> {
    let capture_id = state.service.start_capture(&req.target_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(StartCaptureResponse {
            capture_id,
            target_id: req.target_id,
        }),
    ))
}

/// `GET /api/captures` — snapshot of live sessions.
async fn list_captures(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.service.sessions())
}

/// `GET /api/targets` — debuggable page targets from the browser endpoint.
async fn list_targets(
    State(state): State<AppState>,
) -> Result<Json<Vec<TargetDescriptor>>, ServerError> {
    let targets = state
        .endpoint
        .targets()
        .await
        .map_err(|e| ServerError::Discovery(e.to_string()))?;
    Ok(Json(
        targets.into_iter().filter(TargetDescriptor::is_page).collect(),
    ))
}

/// `GET /health`
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        active_sessions: state.service.sessions().len(),
    })
}

/// `GET /metrics` — Prometheus text format.
async fn metrics_text(State(state): State<AppState>) -> String {
    state.metrics.render()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
