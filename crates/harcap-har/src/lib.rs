//! # harcap-har
//!
//! The pure artifact layer: HAR 1.2 document model, the builder that folds
//! accumulated [`harcap_core::NetworkRecord`]s into a trace document, and
//! base-filename derivation. No I/O and no async; everything here is a
//! function of its inputs, which is what makes the export contract easy to
//! test.

#![deny(unsafe_code)]

pub mod document;
pub mod filename;

pub use document::{build_har, to_pretty_json, Har, HarCreator, HarEntry, HarLog};
pub use filename::{derive_base_name, sanitize_base_name, FALLBACK_BASE_NAME};
