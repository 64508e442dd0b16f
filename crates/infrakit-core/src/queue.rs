use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::{QueuePayload, Result};

/// Per-message callback handed to [`QueueClient::consume`].
pub type QueueConsumer = Arc<dyn Fn(&str) -> Result<()> + Send + Sync>;

/// Capability contract for a named-queue broker.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Publishes `payload` onto `queue`, opening the queue on first use.
    async fn publish(&self, queue: &str, payload: QueuePayload) -> Result<()>;

    /// Consuming is not provided at this layer; backends answer
    /// [`crate::InfraError::NotImplemented`].
    async fn consume(&self, queue: &str, consumer: QueueConsumer) -> Result<()>;
}

#[async_trait]
pub trait QueueClientExt: QueueClient {
    /// Publishes any serializable value as a structured payload.
    async fn publish_value<T>(&self, queue: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync + ?Sized,
    {
        let payload = QueuePayload::structured(value)?;
        self.publish(queue, payload).await
    }
}

impl<Q: QueueClient + ?Sized> QueueClientExt for Q {}
