//! Metric name constants recorded by the capture pipeline.
//!
//! The `metrics` facade macros are invoked at the call sites; the Prometheus
//! recorder itself is installed by the server crate.

/// Live capture sessions (gauge).
pub const SESSIONS_ACTIVE: &str = "capture_sessions_active";
/// Capture sessions started (counter).
pub const CAPTURES_STARTED_TOTAL: &str = "captures_started_total";
/// Start requests rejected because a session was already live (counter).
pub const CAPTURES_REJECTED_TOTAL: &str = "captures_rejected_total";
/// Channel attach failures (counter).
pub const ATTACH_FAILURES_TOTAL: &str = "attach_failures_total";
/// Protocol events folded into a session (counter).
pub const EVENTS_FOLDED_TOTAL: &str = "capture_events_folded_total";
/// Protocol events discarded by the gate or as orphans (counter).
pub const EVENTS_DISCARDED_TOTAL: &str = "capture_events_discarded_total";
/// Exports that ran to completion (counter).
pub const EXPORTS_COMPLETED_TOTAL: &str = "exports_completed_total";
/// Exports aborted by a detach race (counter).
pub const EXPORTS_ABORTED_TOTAL: &str = "exports_aborted_total";
/// Response-body fetches that resolved to nothing (counter).
pub const BODY_HARVEST_FAILURES_TOTAL: &str = "body_harvest_failures_total";
/// Artifacts handed to the sink (counter).
pub const ARTIFACTS_DELIVERED_TOTAL: &str = "artifacts_delivered_total";

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
