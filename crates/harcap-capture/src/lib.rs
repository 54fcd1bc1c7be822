//! # harcap-capture
//!
//! The capture session state machine. One [`CaptureService`] coordinates
//! everything a page-load capture needs:
//!
//! - **Session store** — one [`store::CaptureSession`] per attached target,
//!   holding accumulated records and lifecycle state
//! - **Event accumulator** — folds streamed protocol events into records,
//!   gated by attachment state
//! - **Settle timer** — debounces the page-load signal into a single export
//! - **Exporter** — harvests response bodies, serializes the HAR and console
//!   artifacts, delivers them, and tears the session down exactly once
//!
//! The protocol side is abstracted behind the [`channel::DebuggerChannel`]
//! trait so the whole machine runs against scripted doubles in tests; the
//! real CDP implementation lives in `harcap-cdp`.

#![deny(unsafe_code)]

pub mod accumulator;
pub mod artifacts;
pub mod channel;
pub mod error;
pub mod events;
pub mod export;
pub mod metrics;
pub mod service;
pub mod settle;
pub mod store;

#[cfg(test)]
mod test_util;

pub use artifacts::{ArtifactSink, DiskArtifactSink};
pub use channel::{AttachError, DebuggerChannel};
pub use error::CaptureError;
pub use events::ChannelEvent;
pub use service::{CaptureService, StatusNotifier};
pub use store::{SessionStore, SessionSummary};
