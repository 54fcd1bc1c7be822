//! Prometheus recorder install and `/metrics` rendering.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Connected status-stream clients (gauge).
pub const STATUS_STREAM_CLIENTS: &str = "status_stream_clients";

/// Install the global Prometheus recorder.
///
/// Call once at startup, before any metric is recorded. The handle renders
/// the `/metrics` endpoint.
pub fn install_recorder() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install metrics recorder");
    tracing::info!("prometheus metrics recorder installed");
    handle
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
