//! NATS connection, publish, and subscribe operations.

use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::Stream;
use tracing::debug;

use crate::errors::BusError;

/// Handle to the shared broker connection.
///
/// Cheap to clone; all clones share one underlying connection. The binary
/// connects once at startup and calls [`BusClient::flush`] during graceful
/// shutdown so pending publishes reach the broker before exit.
#[derive(Clone)]
pub struct BusClient {
    inner: async_nats::Client,
}

impl BusClient {
    /// Connect to the broker at `url`.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let inner = async_nats::connect(url).await?;
        debug!(url, "connected to broker");
        Ok(Self { inner })
    }

    /// Publish `payload` on `subject`.
    pub async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.inner.publish(subject.to_owned(), payload).await?;
        Ok(())
    }

    /// Subscribe to `subject`.
    ///
    /// The returned subscription yields payloads in arrival order until the
    /// underlying connection ends.
    pub async fn subscribe(&self, subject: &str) -> Result<BusSubscription, BusError> {
        let inner = self.inner.subscribe(subject.to_owned()).await?;
        debug!(subject, "subscribed");
        Ok(BusSubscription { inner })
    }

    /// Flush pending writes to the broker.
    pub async fn flush(&self) -> Result<(), BusError> {
        self.inner.flush().await?;
        Ok(())
    }
}

/// A live subscription to a single subject.
///
/// Yields each message's payload; metadata (subject, reply, headers) is
/// dropped because the relay forwards payloads verbatim.
pub struct BusSubscription {
    inner: async_nats::Subscriber,
}

impl Stream for BusSubscription {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|msg| msg.map(|m| m.payload))
    }
}
