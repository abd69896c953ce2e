//! `WebSocket` handler for real-time record streaming.
//!
//! Clients connect to `GET /ws/events` and receive one JSON text frame
//! per relayed record, from every watched topic. Client messages other
//! than ping and close are ignored.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use ripstream_core::TopicFilter;
use tracing::debug;

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming records.
///
/// # Route
///
/// `GET /ws/events`
pub async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Register with the hub and forward each frame until either side
/// closes. Dropping the subscription on return unregisters it.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.relay.hub.subscribe(TopicFilter::All);
    debug!(subscriber = %subscription.id(), "WebSocket client connected");

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
            frame = subscription.recv() => {
                let Some(frame) = frame else {
                    debug!("Hub closed, shutting down WebSocket");
                    return;
                };
                if socket.send(Message::Text(frame.json.as_str().into())).await.is_err() {
                    debug!("WebSocket client disconnected (send failed)");
                    return;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("WebSocket client disconnected");
                        return;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!("WebSocket client disconnected (pong failed)");
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        debug!("WebSocket error: {e}");
                        return;
                    }
                    _ => {}
                }
            }
        }
    }
}
