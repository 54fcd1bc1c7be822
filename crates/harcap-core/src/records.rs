//! Per-request accumulation records.
//!
//! A capture session folds streamed protocol events into one
//! [`NetworkRecord`] per request identifier. Records are keyed, not ordered;
//! the export layer later turns them into trace entries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::RequestId;

/// Header map captured verbatim from the protocol source.
///
/// A `BTreeMap` so serialized output is deterministic regardless of the
/// order the source delivered the keys in.
pub type Headers = BTreeMap<String, String>;

/// The request half of a record, captured at the initiation event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    /// HTTP method.
    pub method: String,
    /// Full request URL.
    pub url: String,
    /// Request headers as delivered by the source.
    #[serde(default)]
    pub headers: Headers,
}

/// The response half of a record, captured at the response event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseInfo {
    /// HTTP status code.
    pub status: i64,
    /// HTTP status text (may be empty).
    #[serde(default)]
    pub status_text: String,
    /// Wire protocol (e.g. `http/1.1`, `h2`), when the source reports one.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Response headers as delivered by the source.
    #[serde(default)]
    pub headers: Headers,
    /// Response MIME type, when the source reports one.
    #[serde(default)]
    pub mime_type: Option<String>,
}

/// One network request observed during a capture session.
///
/// Created only by a request-initiation event. Response, completion, and
/// body fields fill in as later events for the same identifier arrive; any
/// of them may stay empty forever (requests that never complete are
/// exported with a placeholder response).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkRecord {
    /// Protocol-assigned request identifier.
    pub request_id: RequestId,
    /// Wall-clock instant of the initiation event.
    pub started_at: DateTime<Utc>,
    /// Request data; records without it are skipped at export time.
    pub request: Option<RequestInfo>,
    /// Response metadata; `None` until a response event arrives.
    pub response: Option<ResponseInfo>,
    /// Response body, harvested best-effort at export time.
    pub body: Option<String>,
    /// Whether `body` is base64-encoded binary data.
    pub body_base64: bool,
    /// Whether a loading-finished event was observed.
    pub finished: bool,
    /// Encoded byte length reported by the loading-finished event.
    pub encoded_data_length: Option<f64>,
}

impl NetworkRecord {
    /// Create a fresh record from an initiation event.
    #[must_use]
    pub fn started(request_id: RequestId, started_at: DateTime<Utc>, request: RequestInfo) -> Self {
        Self {
            request_id,
            started_at,
            request: Some(request),
            response: None,
            body: None,
            body_base64: false,
            finished: false,
            encoded_data_length: None,
        }
    }

    /// Whether this record qualifies for body harvesting: the request both
    /// finished loading and produced response metadata.
    #[must_use]
    pub fn is_body_candidate(&self) -> bool {
        self.finished && self.response.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
