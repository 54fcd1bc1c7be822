//! # harcap-server
//!
//! HTTP + WebSocket control surface over one [`harcap_capture::CaptureService`]:
//!
//! - `POST /api/captures` — start a capture for a target
//! - `GET /api/captures` — live session snapshot
//! - `GET /api/targets` — debuggable page targets from the browser endpoint
//! - `GET /ws/status` — one-way status stream (`Recording...`, `Done!`, …)
//! - `GET /health`, `GET /metrics` — liveness and Prometheus text
//!
//! The server never holds capture state of its own; every route reads
//! through to the service or the DevTools endpoint.

#![deny(unsafe_code)]

pub mod error;
pub mod metrics;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod ws;

#[cfg(test)]
mod test_util;

pub use error::ServerError;
pub use server::{AppState, CaptureServer};
pub use shutdown::ShutdownCoordinator;
