//! WebSocket client connection state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A connected WebSocket client as seen by the broadcast registry.
///
/// The connection is OPEN while its send channel is open; it becomes CLOSED
/// once the socket tasks drop the receiving half.
pub struct ClientConnection {
    /// Unique connection ID.
    pub id: String,
    /// Send channel into the connection's socket write task.
    tx: mpsc::Sender<Bytes>,
    /// When this connection was established.
    pub connected_at: Instant,
    /// Count of payloads dropped because the channel was full or closed.
    dropped_messages: AtomicU64,
}

impl ClientConnection {
    /// Create a new connection handle.
    pub fn new(id: String, tx: mpsc::Sender<Bytes>) -> Self {
        Self {
            id,
            tx,
            connected_at: Instant::now(),
            dropped_messages: AtomicU64::new(0),
        }
    }

    /// Generate a fresh connection ID.
    pub fn next_id() -> String {
        format!("conn_{}", Uuid::now_v7())
    }

    /// Queue a payload for delivery to the client.
    ///
    /// Returns `false` if the channel is full or closed, and increments the
    /// dropped payload counter.
    pub fn send(&self, payload: Bytes) -> bool {
        if self.tx.try_send(payload).is_ok() {
            true
        } else {
            let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
            false
        }
    }

    /// Whether the socket side has hung up.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Total payloads dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
