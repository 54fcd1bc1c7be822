//! The [`DebuggerChannel`] implementation: one WebSocket per attached
//! target.
//!
//! Each attach spawns a session loop that multiplexes outgoing commands
//! (correlated by frame id) with incoming frames from the browser. The
//! null-tolerant contract is enforced here: any failure after attach
//! (missing session, send error, protocol error, timeout, socket gone)
//! resolves a command to `None`. A peer-initiated socket close removes the
//! attachment and emits [`ChannelEvent::Detached`]; a local detach removes
//! it silently.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use harcap_capture::channel::{AttachError, DebuggerChannel};
use harcap_capture::events::{
    ChannelEvent, ConsoleEntry, LoadingFinished, RequestStarted, ResponseReceived,
};
use harcap_core::TargetId;

use crate::discovery::DevToolsEndpoint;
use crate::wire::{self, CommandFrame, Incoming};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Outgoing command handed to the session loop.
struct CdpCommand {
    method: String,
    params: Value,
    reply: oneshot::Sender<Option<Value>>,
}

/// State held per attached target.
struct TargetSession {
    cmd_tx: mpsc::Sender<CdpCommand>,
    cancel: CancellationToken,
}

/// [`DebuggerChannel`] over a Chrome DevTools endpoint.
pub struct CdpChannel {
    endpoint: DevToolsEndpoint,
    sessions: Arc<DashMap<TargetId, TargetSession>>,
    events: broadcast::Sender<ChannelEvent>,
    command_timeout: Duration,
}

impl CdpChannel {
    /// Create a channel over a DevTools endpoint.
    #[must_use]
    pub fn new(endpoint: DevToolsEndpoint, command_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(1024);
        Self {
            endpoint,
            sessions: Arc::new(DashMap::new()),
            events,
            command_timeout,
        }
    }

    /// The endpoint this channel discovers targets through.
    #[must_use]
    pub fn endpoint(&self) -> &DevToolsEndpoint {
        &self.endpoint
    }

    /// Attach to an already-resolved WebSocket URL. Idempotent per target.
    async fn attach_ws(&self, target: &TargetId, ws_url: &str) -> Result<(), AttachError> {
        if self.sessions.contains_key(target) {
            return Ok(());
        }

        let (ws, _) = connect_async(ws_url)
            .await
            .map_err(|e| AttachError::new(format!("WebSocket connect: {e}")))?;

        let (cmd_tx, cmd_rx) = mpsc::channel::<CdpCommand>(64);
        let cancel = CancellationToken::new();
        let _loop_handle = tokio::spawn(session_loop(
            ws,
            cmd_rx,
            cancel.clone(),
            target.clone(),
            Arc::clone(&self.sessions),
            self.events.clone(),
        ));

        let _ = self.sessions.insert(
            target.clone(),
            TargetSession {
                cmd_tx,
                cancel,
            },
        );
        tracing::info!(target_id = %target, "attached");
        Ok(())
    }
}

#[async_trait]
impl DebuggerChannel for CdpChannel {
    async fn attach(&self, target: &TargetId) -> Result<(), AttachError> {
        if self.sessions.contains_key(target) {
            return Ok(());
        }
        let ws_url = self
            .endpoint
            .resolve_ws_url(target)
            .await
            .map_err(|e| AttachError::new(e.to_string()))?;
        self.attach_ws(target, &ws_url).await
    }

    async fn send_command(&self, target: &TargetId, method: &str, params: Value) -> Option<Value> {
        let cmd_tx = self.sessions.get(target).map(|s| s.cmd_tx.clone())?;

        let (reply_tx, reply_rx) = oneshot::channel();
        cmd_tx
            .send(CdpCommand {
                method: method.to_owned(),
                params,
                reply: reply_tx,
            })
            .await
            .ok()?;

        match tokio::time::timeout(self.command_timeout, reply_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Session loop exited with the command in flight.
                None
            }
            Err(_) => {
                tracing::debug!(target_id = %target, method, "command timed out");
                None
            }
        }
    }

    async fn detach(&self, target: &TargetId) {
        if let Some((_, session)) = self.sessions.remove(target) {
            session.cancel.cancel();
            tracing::info!(target_id = %target, "detached");
        }
    }

    fn is_attached(&self, target: &TargetId) -> bool {
        self.sessions.contains_key(target)
    }

    fn subscribe(&self) -> broadcast::Receiver<ChannelEvent> {
        self.events.subscribe()
    }
}

/// Per-target session loop: write commands, correlate responses, map
/// pushed events, and clean up on either side closing.
async fn session_loop(
    ws: WsStream,
    mut cmd_rx: mpsc::Receiver<CdpCommand>,
    cancel: CancellationToken,
    target: TargetId,
    sessions: Arc<DashMap<TargetId, TargetSession>>,
    events: broadcast::Sender<ChannelEvent>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let mut pending: HashMap<u64, oneshot::Sender<Option<Value>>> = HashMap::new();
    let mut next_id: u64 = 1;
    let mut peer_closed = false;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let frame = CommandFrame {
                    id: next_id,
                    method: cmd.method,
                    params: cmd.params,
                };
                next_id += 1;
                let Ok(text) = serde_json::to_string(&frame) else {
                    let _ = cmd.reply.send(None);
                    continue;
                };
                let _ = pending.insert(frame.id, cmd.reply);
                if ws_tx.send(Message::Text(text.into())).await.is_err() {
                    peer_closed = true;
                    break;
                }
            }
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match wire::decode(&text) {
                            Some(Incoming::Response(resp)) => {
                                if let Some(reply) = pending.remove(&resp.id) {
                                    let result = if let Some(error) = resp.error {
                                        tracing::debug!(
                                            target_id = %target,
                                            error = %error.message,
                                            "command failed"
                                        );
                                        None
                                    } else {
                                        Some(resp.result.unwrap_or(Value::Null))
                                    };
                                    let _ = reply.send(result);
                                }
                            }
                            Some(Incoming::Event(frame)) => {
                                if let Some(event) = map_event(&target, &frame.method, frame.params) {
                                    let _ = events.send(event);
                                }
                            }
                            None => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                        peer_closed = true;
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Unanswered commands resolve to None when their senders drop here.
    drop(pending);
    let _ = ws_tx.close().await;

    if peer_closed && sessions.remove(&target).is_some() {
        tracing::info!(target_id = %target, "peer closed the session");
        let _ = events.send(ChannelEvent::Detached {
            target: target.clone(),
        });
    }
}

/// Map a pushed protocol event to a [`ChannelEvent`]. Unknown methods and
/// malformed payloads map to `None` and are dropped.
fn map_event(target: &TargetId, method: &str, params: Value) -> Option<ChannelEvent> {
    let mapped = match method {
        "Log.entryAdded" => serde_json::from_value::<ConsoleEntry>(params.get("entry")?.clone())
            .ok()
            .map(|entry| ChannelEvent::LogEntry {
                target: target.clone(),
                entry,
            }),
        "Network.requestWillBeSent" => serde_json::from_value::<RequestStarted>(params)
            .ok()
            .map(|event| ChannelEvent::RequestStarted {
                target: target.clone(),
                event,
            }),
        "Network.responseReceived" => serde_json::from_value::<ResponseReceived>(params)
            .ok()
            .map(|event| ChannelEvent::ResponseReceived {
                target: target.clone(),
                event,
            }),
        "Network.loadingFinished" => serde_json::from_value::<LoadingFinished>(params)
            .ok()
            .map(|event| ChannelEvent::LoadingFinished {
                target: target.clone(),
                event,
            }),
        "Page.loadEventFired" => Some(ChannelEvent::PageLoaded {
            target: target.clone(),
        }),
        _ => return None,
    };
    if mapped.is_none() {
        tracing::debug!(target_id = %target, method, "malformed event payload dropped");
    }
    mapped
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
