//! # harcap-core
//!
//! Foundation types for the harcap capture service.
//!
//! This crate provides the shared vocabulary the other harcap crates depend
//! on:
//!
//! - **Branded IDs**: `TargetId`, `RequestId` wrapping protocol identifiers,
//!   `CaptureId` minted per capture session for log correlation
//! - **Records**: `NetworkRecord` and its request/response halves, the
//!   per-request accumulation unit a capture session is made of
//! - **Lifecycle**: `CapturePhase` state machine vocabulary and
//!   `StatusUpdate` progress notifications
//! - **Settings**: layered configuration (defaults → JSON file → `HARCAP_*`
//!   env overrides)

#![deny(unsafe_code)]

pub mod ids;
pub mod records;
pub mod settings;
pub mod types;

pub use ids::{CaptureId, RequestId, TargetId};
pub use records::{Headers, NetworkRecord, RequestInfo, ResponseInfo};
pub use settings::{Settings, SettingsError};
pub use types::{CapturePhase, StatusUpdate};
