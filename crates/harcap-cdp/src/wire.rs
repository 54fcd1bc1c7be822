//! CDP wire envelopes and tolerant frame decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An outgoing command frame.
#[derive(Debug, Clone, Serialize)]
pub struct CommandFrame {
    /// Correlation id, unique per connection.
    pub id: u64,
    /// Protocol method (e.g. `Network.enable`).
    pub method: String,
    /// Method parameters.
    pub params: Value,
}

/// A command response frame.
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseFrame {
    /// Correlation id of the command this answers.
    pub id: u64,
    /// Result payload on success.
    #[serde(default)]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(default)]
    pub error: Option<WireError>,
}

/// Error object inside a response frame.
#[derive(Debug, Clone, Deserialize)]
pub struct WireError {
    /// Protocol error message.
    #[serde(default)]
    pub message: String,
}

/// An event frame pushed by the browser.
#[derive(Debug, Clone, Deserialize)]
pub struct EventFrame {
    /// Event method (e.g. `Network.requestWillBeSent`).
    pub method: String,
    /// Event parameters.
    #[serde(default)]
    pub params: Value,
}

/// One decoded incoming frame.
#[derive(Debug, Clone)]
pub enum Incoming {
    /// Response correlated to a sent command.
    Response(ResponseFrame),
    /// Pushed event.
    Event(EventFrame),
}

/// Decode an incoming text frame.
///
/// Frames with an `id` are responses, frames with a `method` are events;
/// anything else (malformed JSON included) decodes to `None` and is
/// dropped by the caller.
#[must_use]
pub fn decode(text: &str) -> Option<Incoming> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("id").is_some() {
        serde_json::from_value(value).ok().map(Incoming::Response)
    } else if value.get("method").is_some() {
        serde_json::from_value(value).ok().map(Incoming::Event)
    } else {
        None
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
