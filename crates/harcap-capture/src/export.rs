//! Exporter: turns accumulated session state into delivered artifacts,
//! exactly once, then tears the session down.
//!
//! Every step re-checks the attachment gate where it matters. Body fetches
//! are a best-effort fan-out; a detach between the gate and delivery aborts
//! with zero artifacts, so either the full artifact set is delivered or
//! none of it is.

use metrics::{counter, gauge};
use serde_json::{json, Value};

use harcap_core::{CapturePhase, NetworkRecord, RequestId, TargetId};
use harcap_har::{build_har, derive_base_name, to_pretty_json};

use crate::artifacts::ArtifactSink;
use crate::channel::DebuggerChannel;
use crate::metrics::{
    ARTIFACTS_DELIVERED_TOTAL, BODY_HARVEST_FAILURES_TOTAL, EXPORTS_ABORTED_TOTAL,
    EXPORTS_COMPLETED_TOTAL, SESSIONS_ACTIVE,
};
use crate::service::StatusNotifier;
use crate::store::SessionStore;

/// Run one export for a target: harvest bodies, serialize, deliver, purge.
///
/// Aborts with no side effects if the target is not attached, has no
/// session, or is already exporting when the export begins; aborts with
/// zero artifacts if a detach races in before delivery.
pub async fn run_export(
    channel: &dyn DebuggerChannel,
    store: &SessionStore,
    sink: &dyn ArtifactSink,
    status: &StatusNotifier,
    target: &TargetId,
) {
    // Entry gate: a detach or a completed earlier export makes this a no-op.
    if !channel.is_attached(target) || !store.contains(target) {
        tracing::debug!(target_id = %target, "export aborted at entry gate");
        counter!(EXPORTS_ABORTED_TOTAL).increment(1);
        return;
    }
    // A load signal during an in-flight export can arm a fresh timer before
    // the first export detaches; the phase check makes that timer a no-op.
    if store.phase(target) == Some(CapturePhase::Exporting) {
        tracing::debug!(target_id = %target, "export already in flight");
        counter!(EXPORTS_ABORTED_TOTAL).increment(1);
        return;
    }
    let _ = store.set_phase(target, CapturePhase::Exporting);

    harvest_bodies(channel, store, target).await;

    let base_name = fetch_base_name(channel, target).await;
    status.post(target, "Downloading...");

    // Snapshot under a short-lived guard, then re-check the gate: the body
    // fan-out and the title fetch are suspension points a detach can race.
    let snapshot = store.with_session(target, |session| {
        (
            session.console.clone(),
            session.network.values().cloned().collect::<Vec<_>>(),
        )
    });
    let attached = channel.is_attached(target);
    let Some((console, records)) = snapshot.filter(|_| attached) else {
        tracing::debug!(target_id = %target, "export aborted before delivery (detach race)");
        counter!(EXPORTS_ABORTED_TOTAL).increment(1);
        if store.purge(target) {
            gauge!(SESSIONS_ACTIVE).decrement(1.0);
        }
        return;
    };

    deliver_artifacts(sink, &base_name, &console, &records).await;

    // Teardown runs unconditionally once artifacts are out: best-effort
    // detach, purge (cancels any residual timer), terminal status.
    channel.detach(target).await;
    if store.purge(target) {
        gauge!(SESSIONS_ACTIVE).decrement(1.0);
    }
    counter!(EXPORTS_COMPLETED_TOTAL).increment(1);
    tracing::info!(target_id = %target, base_name, "capture exported");
    status.post(target, "Done!");
}

/// Fetch response bodies for all finished requests with a response,
/// independently and best-effort.
async fn harvest_bodies(channel: &dyn DebuggerChannel, store: &SessionStore, target: &TargetId) {
    let candidates: Vec<RequestId> = store
        .with_session(target, |session| {
            session
                .network
                .values()
                .filter(|rec| rec.is_body_candidate())
                .map(|rec| rec.request_id.clone())
                .collect()
        })
        .unwrap_or_default();

    let fetches = candidates.into_iter().map(|request_id| async move {
        let result = channel
            .send_command(
                target,
                "Network.getResponseBody",
                json!({ "requestId": request_id.as_str() }),
            )
            .await;
        (request_id, result)
    });

    for (request_id, result) in futures::future::join_all(fetches).await {
        let Some(value) = result else {
            tracing::debug!(target_id = %target, request_id = %request_id, "body fetch skipped");
            counter!(BODY_HARVEST_FAILURES_TOTAL).increment(1);
            continue;
        };
        let Some(body) = value.get("body").and_then(Value::as_str) else {
            counter!(BODY_HARVEST_FAILURES_TOTAL).increment(1);
            continue;
        };
        let base64 = value
            .get("base64Encoded")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let _ = store.with_session(target, |session| {
            if let Some(rec) = session.network.get_mut(&request_id) {
                rec.body = Some(body.to_owned());
                rec.body_base64 = base64;
            }
        });
    }
}

/// Derive the artifact base name from the target's title, then its URL
/// host, then the fixed fallback. Null-tolerant end to end.
async fn fetch_base_name(channel: &dyn DebuggerChannel, target: &TargetId) -> String {
    let info = channel
        .send_command(target, "Target.getTargetInfo", json!({}))
        .await;
    let (title, url) = info
        .as_ref()
        .map(|value| {
            let target_info = value.get("targetInfo").unwrap_or(value);
            (
                target_info.get("title").and_then(Value::as_str),
                target_info.get("url").and_then(Value::as_str),
            )
        })
        .unwrap_or((None, None));
    derive_base_name(title, url)
}

/// Console artifact (when non-empty) first, then the HAR document, always.
async fn deliver_artifacts(
    sink: &dyn ArtifactSink,
    base_name: &str,
    console: &[String],
    records: &[NetworkRecord],
) {
    if !console.is_empty() {
        let name = format!("{base_name}_Console.txt");
        deliver(sink, &name, console.join("\n").into_bytes()).await;
    }

    let har = build_har(records.iter());
    match to_pretty_json(&har) {
        Ok(text) => {
            let name = format!("{base_name}.har");
            deliver(sink, &name, text.into_bytes()).await;
        }
        Err(error) => {
            tracing::error!(%error, "HAR serialization failed, artifact skipped");
        }
    }
}

async fn deliver(sink: &dyn ArtifactSink, filename: &str, contents: Vec<u8>) {
    match sink.deliver(filename, &contents).await {
        Ok(path) => {
            counter!(ARTIFACTS_DELIVERED_TOTAL).increment(1);
            tracing::debug!(filename, path = %path.display(), "artifact delivered");
        }
        Err(error) => {
            tracing::warn!(filename, %error, "artifact delivery failed");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::test_util::{MemorySink, ScriptedChannel};
    use chrono::Utc;
    use harcap_core::{Headers, RequestInfo, ResponseInfo};

    fn seeded_store(target: &TargetId) -> Arc<SessionStore> {
        let store = Arc::new(SessionStore::new());
        let _ = store.insert_new(target).unwrap();
        store
    }

    fn finished_record(id: &str, status: i64) -> NetworkRecord {
        let mut rec = NetworkRecord::started(
            id.into(),
            Utc::now(),
            RequestInfo {
                method: "GET".to_owned(),
                url: "https://example.com/".to_owned(),
                headers: Headers::new(),
            },
        );
        rec.response = Some(ResponseInfo {
            status,
            status_text: "OK".to_owned(),
            protocol: None,
            headers: Headers::new(),
            mime_type: Some("text/plain".to_owned()),
        });
        rec.finished = true;
        rec
    }

    fn insert_record(store: &SessionStore, target: &TargetId, rec: NetworkRecord) {
        let _ = store
            .with_session(target, |s| {
                let _ = s.network.insert(rec.request_id.clone(), rec);
            })
            .unwrap();
    }

    #[tokio::test]
    async fn entry_gate_aborts_when_not_attached() {
        let target = TargetId::from("t1");
        let channel = ScriptedChannel::new();
        let store = seeded_store(&target);
        let sink = MemorySink::new();
        let status = StatusNotifier::new(16);

        run_export(&channel, &store, &sink, &status, &target).await;

        assert!(sink.names().is_empty(), "no artifacts without attachment");
        assert!(store.contains(&target), "entry-gate abort has no side effects");
    }

    #[tokio::test]
    async fn detach_between_harvest_and_delivery_yields_zero_artifacts() {
        let target = TargetId::from("t1");
        let channel = ScriptedChannel::new();
        channel.attach(&target).await.unwrap();
        // Fetching the target info drops the attachment mid-export.
        channel.detach_on_command("Target.getTargetInfo");

        let store = seeded_store(&target);
        insert_record(&store, &target, finished_record("r1", 200));
        let sink = MemorySink::new();
        let status = StatusNotifier::new(16);

        run_export(&channel, &store, &sink, &status, &target).await;

        assert!(sink.names().is_empty(), "either all artifacts or none");
        assert!(!store.contains(&target), "session purged on mid-flight abort");
    }

    #[tokio::test]
    async fn partial_body_failures_do_not_block_other_candidates() {
        let target = TargetId::from("t1");
        let channel = ScriptedChannel::new();
        channel.attach(&target).await.unwrap();
        channel.respond(
            "Network.getResponseBody",
            json!({ "body": "payload", "base64Encoded": false }),
        );
        // r2 fetch fails: respond_once consumes the scripted result for r1.
        channel.respond_times("Network.getResponseBody", 1);
        channel.respond(
            "Target.getTargetInfo",
            json!({ "targetInfo": { "title": "Partial", "url": "https://example.com/" } }),
        );

        let store = seeded_store(&target);
        insert_record(&store, &target, finished_record("r1", 200));
        insert_record(&store, &target, finished_record("r2", 200));
        let sink = MemorySink::new();
        let status = StatusNotifier::new(16);

        run_export(&channel, &store, &sink, &status, &target).await;

        let har: Value =
            serde_json::from_slice(&sink.contents("Partial.har").unwrap()).unwrap();
        let entries = har["log"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        let texts: Vec<bool> = entries
            .iter()
            .map(|e| e["response"]["content"].get("text").is_some())
            .collect();
        assert_eq!(
            texts.iter().filter(|present| **present).count(),
            1,
            "one harvested body, one skipped"
        );
    }

    #[tokio::test]
    async fn export_purges_session_and_detaches() {
        let target = TargetId::from("t1");
        let channel = ScriptedChannel::new();
        channel.attach(&target).await.unwrap();
        let store = seeded_store(&target);
        let sink = MemorySink::new();
        let status = StatusNotifier::new(16);
        let mut rx = status.subscribe();

        run_export(&channel, &store, &sink, &status, &target).await;

        assert!(!store.contains(&target));
        assert!(!channel.is_attached(&target));
        // Empty session still always yields a HAR with no entries.
        assert_eq!(sink.names(), vec!["Trace.har".to_owned()]);

        let mut texts = Vec::new();
        while let Ok(update) = rx.try_recv() {
            texts.push(update.text);
        }
        assert_eq!(texts, vec!["Downloading...".to_owned(), "Done!".to_owned()]);
    }

    #[tokio::test]
    async fn second_export_for_same_target_is_a_noop() {
        let target = TargetId::from("t1");
        let channel = ScriptedChannel::new();
        channel.attach(&target).await.unwrap();
        let store = seeded_store(&target);
        let sink = MemorySink::new();
        let status = StatusNotifier::new(16);

        run_export(&channel, &store, &sink, &status, &target).await;
        run_export(&channel, &store, &sink, &status, &target).await;

        assert_eq!(sink.names().len(), 1, "artifacts emitted at most once");
    }

    #[tokio::test]
    async fn export_while_one_is_in_flight_is_a_noop() {
        let target = TargetId::from("t1");
        let channel = ScriptedChannel::new();
        channel.attach(&target).await.unwrap();
        let store = seeded_store(&target);
        let sink = MemorySink::new();
        let status = StatusNotifier::new(16);

        // A late load signal can trigger a second export while the first is
        // still between its entry gate and its teardown.
        let _ = store.set_phase(&target, CapturePhase::Exporting);
        run_export(&channel, &store, &sink, &status, &target).await;

        assert!(sink.names().is_empty(), "in-flight export owns the artifacts");
        assert!(store.contains(&target), "in-flight export owns the teardown");
        assert!(channel.is_attached(&target));
    }
}
