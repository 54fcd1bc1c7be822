//! One-way status stream over WebSocket.
//!
//! Clients receive every [`StatusUpdate`] the capture service posts, as one
//! JSON text frame each. The stream is fire-and-forget: a lagged client
//! loses updates rather than applying backpressure to the service.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use metrics::gauge;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use harcap_core::StatusUpdate;

use crate::metrics::STATUS_STREAM_CLIENTS;
use crate::server::AppState;

/// `GET /ws/status` — upgrade and stream status updates until the client
/// disconnects or the server shuts down.
pub async fn status_stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let updates = state.service.subscribe_status();
    let cancel = state.shutdown.token();
    ws.on_upgrade(move |socket| async move {
        gauge!(STATUS_STREAM_CLIENTS).increment(1.0);
        run_stream(socket, updates, cancel).await;
        gauge!(STATUS_STREAM_CLIENTS).decrement(1.0);
    })
}

async fn run_stream(
    mut socket: WebSocket,
    mut updates: broadcast::Receiver<StatusUpdate>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    let Ok(text) = serde_json::to_string(&update) else { continue };
                    if socket.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(lagged = n, "status stream client lagged, updates lost");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            // Drain the client side so closes are noticed promptly.
            msg = socket.recv() => match msg {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
