//! Message ingress — the publisher seam behind `POST /send`.
//!
//! The HTTP handler talks to an `Arc<dyn MessagePublisher>` so tests can
//! swap in channel-backed doubles; the binary plugs in [`SubjectPublisher`],
//! which pairs the shared [`BusClient`] with the configured subject.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use subcast_bus::{BusClient, BusError};
use thiserror::Error;

/// Fixed response body for `POST /send`, returned regardless of publish
/// outcome.
pub const SEND_RESPONSE: &str = "Message sent";

/// Request body for `POST /send`.
#[derive(Debug, Deserialize)]
pub struct SendRequest {
    /// Raw message payload; forwarded to the bus verbatim.
    pub message: String,
}

/// Error returned by [`MessagePublisher`] implementations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The bus client rejected the publish.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// The publisher's backend is gone.
    #[error("publisher closed")]
    Closed,
}

/// Sink for ingress messages.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish one payload.
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError>;
}

/// Publishes every payload to one fixed subject on the shared bus client.
pub struct SubjectPublisher {
    client: BusClient,
    subject: String,
}

impl SubjectPublisher {
    /// Create a publisher bound to `subject`.
    pub fn new(client: BusClient, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }
}

#[async_trait]
impl MessagePublisher for SubjectPublisher {
    async fn publish(&self, payload: Bytes) -> Result<(), PublishError> {
        self.client.publish(&self.subject, payload).await?;
        Ok(())
    }
}
