//! WebSocket connection lifecycle, broadcast registry, and bus bridge.

pub mod bridge;
pub mod broadcast;
pub mod connection;

use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use crate::server::AppState;
use connection::ClientConnection;

/// Drive one upgraded socket for its whole life.
///
/// Registers the connection, splits the socket into a write task (channel →
/// socket, periodic pings, shutdown-aware) and a read task (the relay is
/// push-only, so client frames are drained and discarded), then unregisters
/// when either side finishes.
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::channel::<Bytes>(state.send_queue);
    let conn = Arc::new(ClientConnection::new(ClientConnection::next_id(), tx));
    let conn_id = conn.id.clone();
    state.broadcast.add(conn.clone()).await;
    info!(conn_id = %conn_id, "WebSocket client connected");

    let (mut ws_tx, mut ws_rx) = socket.split();

    // Write task: forward broadcast payloads, ping periodically, close on
    // shutdown.
    let shutdown = state.shutdown.token();
    let writer_cid = conn_id.clone();
    let mut writer = tokio::spawn(async move {
        let mut ping_interval = tokio::time::interval(state.heartbeat_interval);
        let _ = ping_interval.tick().await; // consume the immediate first tick

        loop {
            tokio::select! {
                payload = rx.recv() => {
                    match payload {
                        Some(payload) => {
                            if ws_tx.send(to_ws_message(payload)).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = ping_interval.tick() => {
                    if ws_tx.send(WsMessage::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                    trace!(conn_id = %writer_cid, "sent ping");
                }
                () = shutdown.cancelled() => {
                    let _ = ws_tx.send(WsMessage::Close(None)).await;
                    break;
                }
            }
        }
    });

    // Read task: drain client frames until the socket closes.
    let reader_cid = conn_id.clone();
    let mut reader = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                WsMessage::Close(_) => break,
                // The relay never consumes client data; axum answers pings
                // automatically.
                other => debug!(conn_id = %reader_cid, "ignoring client frame: {other:?}"),
            }
        }
    });

    tokio::select! {
        _ = &mut writer => {}
        _ = &mut reader => {}
    }

    state.broadcast.remove(&conn_id).await;
    info!(
        conn_id = %conn_id,
        age_secs = conn.age().as_secs(),
        dropped = conn.drop_count(),
        "WebSocket client disconnected"
    );
}

/// Convert a bus payload into the outgoing frame type.
///
/// UTF-8 payloads go out as text frames (what browser clients expect);
/// anything else goes out as binary so bytes are never mangled.
fn to_ws_message(payload: Bytes) -> WsMessage {
    match String::from_utf8(payload.to_vec()) {
        Ok(text) => WsMessage::Text(text.into()),
        Err(_) => WsMessage::Binary(payload),
    }
}
