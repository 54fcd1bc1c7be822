//! Event accumulator: folds protocol events into a session's records.
//!
//! The accumulator only ever mutates an existing session; the attachment
//! gate is checked by the event pump before folding. Orphan events (a
//! response or completion for an identifier with no prior initiation) are
//! discarded; the protocol source guarantees causal ordering per request,
//! so an orphan means the record-creating event was never observed and the
//! event has nothing to fold into.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use harcap_core::{NetworkRecord, TargetId};

use crate::events::{ChannelEvent, ConsoleEntry, LoadingFinished, RequestStarted, ResponseReceived};
use crate::store::SessionStore;

/// Fold a record-bearing event into the session for its target.
///
/// Returns `true` if the event mutated the session, `false` if it was
/// discarded (no session, orphan identifier, or empty console text).
/// `PageLoaded` and `Detached` are lifecycle signals, not record events,
/// and always return `false`; the service handles them.
pub fn fold(store: &SessionStore, event: &ChannelEvent) -> bool {
    match event {
        ChannelEvent::LogEntry { target, entry } => fold_log_entry(store, target, entry),
        ChannelEvent::RequestStarted { target, event } => {
            fold_request_started(store, target, event)
        }
        ChannelEvent::ResponseReceived { target, event } => {
            fold_response_received(store, target, event)
        }
        ChannelEvent::LoadingFinished { target, event } => {
            fold_loading_finished(store, target, event)
        }
        ChannelEvent::PageLoaded { .. } | ChannelEvent::Detached { .. } => false,
    }
}

fn fold_log_entry(store: &SessionStore, target: &TargetId, entry: &ConsoleEntry) -> bool {
    let Some(line) = format_console_line(entry) else {
        return false;
    };
    store
        .with_session(target, |session| session.console.push(line))
        .is_some()
}

fn fold_request_started(store: &SessionStore, target: &TargetId, event: &RequestStarted) -> bool {
    let started_at = wall_time_to_instant(event.wall_time);
    let request = event.request.clone().into_request_info();
    store
        .with_session(target, |session| {
            // Overwrite, not merge: a second initiation is a fresh request.
            // The previously observed encoded length is the one field that
            // survives the replacement.
            let carried_length = session
                .network
                .get(&event.request_id)
                .and_then(|rec| rec.encoded_data_length);
            let mut record = NetworkRecord::started(event.request_id.clone(), started_at, request);
            record.encoded_data_length = carried_length;
            let _ = session.network.insert(event.request_id.clone(), record);
        })
        .is_some()
}

fn fold_response_received(
    store: &SessionStore,
    target: &TargetId,
    event: &ResponseReceived,
) -> bool {
    store
        .with_session(target, |session| {
            session
                .network
                .get_mut(&event.request_id)
                .map(|record| {
                    record.response = Some(event.response.clone().into_response_info());
                })
                .is_some()
        })
        .unwrap_or(false)
}

fn fold_loading_finished(
    store: &SessionStore,
    target: &TargetId,
    event: &LoadingFinished,
) -> bool {
    store
        .with_session(target, |session| {
            session
                .network
                .get_mut(&event.request_id)
                .map(|record| {
                    record.finished = true;
                    record.encoded_data_length = Some(event.encoded_data_length);
                })
                .is_some()
        })
        .unwrap_or(false)
}

/// Format a console entry as `"[level] ISO8601-timestamp: text"`.
///
/// Entries whose text trims to empty are skipped entirely.
pub fn format_console_line(entry: &ConsoleEntry) -> Option<String> {
    if entry.text.trim().is_empty() {
        return None;
    }
    let instant = epoch_millis_to_instant(entry.timestamp);
    Some(format!(
        "[{}] {}: {}",
        entry.level,
        instant.to_rfc3339_opts(SecondsFormat::Millis, true),
        entry.text
    ))
}

/// Convert the protocol's wall-clock time (seconds since epoch) to an
/// instant. Out-of-range values clamp to the epoch.
fn wall_time_to_instant(wall_time: f64) -> DateTime<Utc> {
    epoch_millis_to_instant(wall_time * 1000.0)
}

#[allow(clippy::cast_possible_truncation)]
fn epoch_millis_to_instant(millis: f64) -> DateTime<Utc> {
    if millis.is_finite() {
        Utc.timestamp_millis_opt(millis as i64)
            .single()
            .unwrap_or_default()
    } else {
        DateTime::<Utc>::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
