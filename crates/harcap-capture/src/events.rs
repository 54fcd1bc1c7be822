//! Protocol events as the accumulator consumes them.
//!
//! Payload structs are deliberately tolerant: optional fields default, and
//! only the identifiers needed to route an event are required. A payload
//! the channel cannot deserialize is dropped at the channel boundary, never
//! surfaced as an error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use harcap_core::{Headers, RequestId, RequestInfo, ResponseInfo, TargetId};

/// One event delivered by a [`crate::channel::DebuggerChannel`].
///
/// No ordering is guaranteed relative to command completions, and a
/// `Detached` notification may race in-flight event delivery.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A console/log entry was emitted by the page.
    LogEntry {
        /// Target the entry came from.
        target: TargetId,
        /// The entry payload.
        entry: ConsoleEntry,
    },
    /// A network request was initiated.
    RequestStarted {
        /// Target the request belongs to.
        target: TargetId,
        /// The initiation payload.
        event: RequestStarted,
    },
    /// Response metadata arrived for an in-flight request.
    ResponseReceived {
        /// Target the response belongs to.
        target: TargetId,
        /// The response payload.
        event: ResponseReceived,
    },
    /// A request finished loading.
    LoadingFinished {
        /// Target the request belongs to.
        target: TargetId,
        /// The completion payload.
        event: LoadingFinished,
    },
    /// The page fired its load event.
    PageLoaded {
        /// Target that loaded.
        target: TargetId,
    },
    /// The channel detached from the target (peer-initiated or socket
    /// closure). All state for the target must be torn down.
    Detached {
        /// Target that detached.
        target: TargetId,
    },
}

impl ChannelEvent {
    /// Target this event concerns.
    #[must_use]
    pub fn target(&self) -> &TargetId {
        match self {
            Self::LogEntry { target, .. }
            | Self::RequestStarted { target, .. }
            | Self::ResponseReceived { target, .. }
            | Self::LoadingFinished { target, .. }
            | Self::PageLoaded { target }
            | Self::Detached { target } => target,
        }
    }
}

/// A console/log entry payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    /// Severity label as reported by the source (`verbose`, `info`, …).
    #[serde(default)]
    pub level: String,
    /// Entry text; entries that trim to empty are skipped.
    #[serde(default)]
    pub text: String,
    /// Wall-clock timestamp in epoch milliseconds.
    #[serde(default)]
    pub timestamp: f64,
}

/// Request-initiation payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestStarted {
    /// Protocol-assigned request identifier.
    pub request_id: RequestId,
    /// Request data captured verbatim.
    pub request: WireRequest,
    /// Wall-clock time of initiation, in epoch seconds.
    #[serde(default)]
    pub wall_time: f64,
}

/// Response-received payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseReceived {
    /// Protocol-assigned request identifier.
    pub request_id: RequestId,
    /// Response metadata.
    pub response: WireResponse,
}

/// Loading-finished payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingFinished {
    /// Protocol-assigned request identifier.
    pub request_id: RequestId,
    /// Encoded byte length of the completed response.
    #[serde(default)]
    pub encoded_data_length: f64,
}

/// Request data as it appears on the wire: header values arrive as
/// arbitrary JSON and are stringified on conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRequest {
    /// HTTP method.
    #[serde(default)]
    pub method: String,
    /// Full request URL.
    #[serde(default)]
    pub url: String,
    /// Raw header map.
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
}

impl WireRequest {
    /// Convert into the storage shape, stringifying header values.
    #[must_use]
    pub fn into_request_info(self) -> RequestInfo {
        RequestInfo {
            method: self.method,
            url: self.url,
            headers: stringify_headers(self.headers),
        }
    }
}

/// Response metadata as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireResponse {
    /// HTTP status code.
    #[serde(default)]
    pub status: i64,
    /// HTTP status text.
    #[serde(default)]
    pub status_text: String,
    /// Wire protocol (e.g. `h2`), when reported.
    #[serde(default)]
    pub protocol: Option<String>,
    /// Raw header map.
    #[serde(default)]
    pub headers: BTreeMap<String, Value>,
    /// Response MIME type, when reported.
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl WireResponse {
    /// Convert into the storage shape, stringifying header values.
    #[must_use]
    pub fn into_response_info(self) -> ResponseInfo {
        ResponseInfo {
            status: self.status,
            status_text: self.status_text,
            protocol: self.protocol,
            headers: stringify_headers(self.headers),
            mime_type: self.mime_type,
        }
    }
}

/// Stringify raw header values: strings pass through, anything else is
/// rendered as its JSON text.
fn stringify_headers(raw: BTreeMap<String, Value>) -> Headers {
    raw.into_iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (name, value)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
