//! Bus error types.

use thiserror::Error;

/// Errors surfaced by the bus client.
#[derive(Debug, Error)]
pub enum BusError {
    /// The broker was unreachable or rejected the connection.
    #[error("failed to connect to broker: {0}")]
    Connect(#[from] async_nats::ConnectError),
    /// A publish could not be written to the connection.
    #[error("publish failed: {0}")]
    Publish(#[from] async_nats::client::PublishError),
    /// A subscription could not be established.
    #[error("subscribe failed: {0}")]
    Subscribe(#[from] async_nats::SubscribeError),
    /// Flushing pending writes to the broker failed.
    #[error("flush failed: {0}")]
    Flush(#[from] async_nats::client::FlushError),
}
