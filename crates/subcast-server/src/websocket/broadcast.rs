//! Payload fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Maximum total lifetime drops before forcibly removing a slow client.
const MAX_TOTAL_DROPS: u64 = 100;

/// Registry of live connections and the fan-out path to them.
pub struct BroadcastManager {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<String, Arc<ClientConnection>>>,
    /// Atomic counter tracking total connections (avoids read-locking for
    /// count queries).
    active_count: AtomicUsize,
}

impl BroadcastManager {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Add a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        if conns.insert(connection.id.clone(), connection).is_none() {
            let _ = self.active_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Remove a connection by ID.
    pub async fn remove(&self, connection_id: &str) {
        let mut conns = self.connections.write().await;
        if conns.remove(connection_id).is_some() {
            let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
        }
    }

    /// Fan a payload out to every open connection.
    ///
    /// Connections whose socket has hung up are removed; connections whose
    /// queue is full are skipped, and removed once their lifetime drop count
    /// crosses the budget. Neither case is an error for the caller.
    pub async fn broadcast(&self, payload: Bytes) {
        let mut to_remove = Vec::new();
        {
            let conns = self.connections.read().await;
            let mut recipients = 0u32;
            for conn in conns.values() {
                if conn.send(payload.clone()) {
                    recipients += 1;
                } else if conn.is_closed() {
                    to_remove.push(conn.id.clone());
                } else {
                    let drops = conn.drop_count();
                    if drops >= MAX_TOTAL_DROPS {
                        warn!(conn_id = %conn.id, drops, "removing slow client");
                        to_remove.push(conn.id.clone());
                    } else {
                        warn!(conn_id = %conn.id, total_drops = drops, "client queue full, payload dropped");
                    }
                }
            }
            debug!(len = payload.len(), recipients, "broadcast payload");
        }
        if !to_remove.is_empty() {
            let mut conns = self.connections.write().await;
            for id in &to_remove {
                if conns.remove(id).is_some() {
                    let _ = self.active_count.fetch_sub(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Number of active connections.
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> (Arc<ClientConnection>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(32);
        (Arc::new(ClientConnection::new(id.into(), tx)), rx)
    }

    #[tokio::test]
    async fn add_connection() {
        let bm = BroadcastManager::new();
        let (conn, _rx) = make_connection("c1");
        bm.add(conn).await;
        assert_eq!(bm.connection_count(), 1);
    }

    #[tokio::test]
    async fn remove_connection() {
        let bm = BroadcastManager::new();
        let (conn, _rx) = make_connection("c1");
        bm.add(conn).await;
        bm.remove("c1").await;
        assert_eq!(bm.connection_count(), 0);
    }

    #[tokio::test]
    async fn remove_nonexistent_connection() {
        let bm = BroadcastManager::new();
        bm.remove("no_such").await;
        assert_eq!(bm.connection_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_open_connections() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1");
        let (c2, mut rx2) = make_connection("c2");
        bm.add(c1).await;
        bm.add(c2).await;

        bm.broadcast(Bytes::from_static(b"hello")).await;

        assert_eq!(&rx1.try_recv().unwrap()[..], b"hello");
        assert_eq!(&rx2.try_recv().unwrap()[..], b"hello");
    }

    #[tokio::test]
    async fn broadcast_to_empty_registry() {
        let bm = BroadcastManager::new();
        // Should not panic
        bm.broadcast(Bytes::from_static(b"nobody home")).await;
    }

    #[tokio::test]
    async fn closed_connection_is_skipped_and_removed() {
        let bm = BroadcastManager::new();
        let (open, mut open_rx) = make_connection("open");
        let (tx, rx) = mpsc::channel(32);
        let closed = Arc::new(ClientConnection::new("closed".into(), tx));
        drop(rx);
        bm.add(open).await;
        bm.add(closed).await;
        assert_eq!(bm.connection_count(), 2);

        bm.broadcast(Bytes::from_static(b"m")).await;

        // The open connection got the payload, the closed one was reaped
        assert!(open_rx.try_recv().is_ok());
        assert_eq!(bm.connection_count(), 1);
    }

    #[tokio::test]
    async fn slow_client_removed_after_drop_budget() {
        let bm = BroadcastManager::new();
        let (tx, _rx) = mpsc::channel(1);
        let slow = Arc::new(ClientConnection::new("slow".into(), tx));
        let (fast, mut fast_rx) = make_connection("fast");
        bm.add(slow).await;
        bm.add(fast).await;

        let payload = Bytes::from_static(b"p");
        // First broadcast fills the slow client's queue
        bm.broadcast(payload.clone()).await;
        // Exceed the drop budget
        for _ in 0..MAX_TOTAL_DROPS {
            bm.broadcast(payload.clone()).await;
            while fast_rx.try_recv().is_ok() {}
        }

        assert_eq!(bm.connection_count(), 1);
    }

    #[tokio::test]
    async fn fast_client_survives_repeated_broadcasts() {
        let bm = BroadcastManager::new();
        let (fast, mut rx) = make_connection("fast");
        bm.add(fast).await;

        for _ in 0..20 {
            bm.broadcast(Bytes::from_static(b"p")).await;
            while rx.try_recv().is_ok() {}
        }

        assert_eq!(bm.connection_count(), 1);
    }

    #[tokio::test]
    async fn add_same_id_does_not_double_count() {
        let bm = BroadcastManager::new();
        let (c1, _rx1) = make_connection("same");
        let (c2, _rx2) = make_connection("same");
        bm.add(c1).await;
        bm.add(c2).await;
        assert_eq!(bm.connection_count(), 1);
        bm.remove("same").await;
        assert_eq!(bm.connection_count(), 0);
    }

    #[tokio::test]
    async fn broadcast_shares_payload_buffer() {
        let bm = BroadcastManager::new();
        let (c1, mut rx1) = make_connection("c1");
        let (c2, mut rx2) = make_connection("c2");
        bm.add(c1).await;
        bm.add(c2).await;

        let payload = Bytes::from_static(b"shared");
        bm.broadcast(payload.clone()).await;

        let p1 = rx1.try_recv().unwrap();
        let p2 = rx2.try_recv().unwrap();
        // Bytes clones share the underlying buffer
        assert_eq!(p1.as_ptr(), p2.as_ptr());
        assert_eq!(p1, p2);
    }

    #[tokio::test]
    async fn two_deliveries_for_two_broadcasts_of_same_payload() {
        let bm = BroadcastManager::new();
        let (conn, mut rx) = make_connection("c1");
        bm.add(conn).await;

        let payload = Bytes::from_static(b"again");
        bm.broadcast(payload.clone()).await;
        bm.broadcast(payload).await;

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn default_registry_is_empty() {
        let bm = BroadcastManager::default();
        assert_eq!(bm.connection_count(), 0);
    }
}
