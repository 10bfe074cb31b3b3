//! Bus bridge — drains the shared subject subscription and fans each payload
//! out through the `BroadcastManager`.
//!
//! Exactly one bridge runs per process. Its lifetime is scoped to the
//! shutdown token, not to any single client connection, so closing a client
//! never leaves an orphaned subscription loop behind.

use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::broadcast::BroadcastManager;

/// Bridges bus payloads to WebSocket clients.
pub struct BusBridge<S> {
    stream: S,
    broadcast: Arc<BroadcastManager>,
    token: CancellationToken,
}

impl<S> BusBridge<S>
where
    S: Stream<Item = Bytes> + Unpin + Send,
{
    /// Create a new bridge over a payload stream.
    pub fn new(stream: S, broadcast: Arc<BroadcastManager>, token: CancellationToken) -> Self {
        Self {
            stream,
            broadcast,
            token,
        }
    }

    /// Run the bridge loop.
    ///
    /// Exits when the shutdown token fires or the subscription stream ends
    /// (broker disconnect). There is no restart.
    #[tracing::instrument(skip_all, name = "bus_bridge")]
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                () = self.token.cancelled() => {
                    info!("bus bridge cancelled, exiting");
                    break;
                }
                payload = self.stream.next() => match payload {
                    Some(payload) => {
                        debug!(len = payload.len(), "bridging bus payload");
                        self.broadcast.broadcast(payload).await;
                    }
                    None => {
                        info!("bus subscription ended, exiting");
                        break;
                    }
                },
            }
        }
    }
}
