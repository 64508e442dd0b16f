use crate::features::queue::repo::{QueueChannel, QueueRepository};
use async_trait::async_trait;
use infrakit_core::{InfraError, QueueClient, QueueConsumer, QueuePayload, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

type ChannelCell = Arc<OnceCell<Arc<dyn QueueChannel>>>;

/// [`QueueClient`] over any [`QueueRepository`].
///
/// Queues are opened on first publish and the handle is cached by name. Each
/// name has its own cell, so a slow open only holds up publishers of that
/// queue. A failed open leaves the cell empty and the next publish retries.
pub struct QueueService {
    repo: Arc<dyn QueueRepository>,
    channels: RwLock<HashMap<String, ChannelCell>>,
}

impl QueueService {
    pub fn new(repo: Arc<dyn QueueRepository>) -> Self {
        Self {
            repo,
            channels: RwLock::new(HashMap::new()),
        }
    }

    async fn cell(&self, name: &str) -> ChannelCell {
        let cached = self.channels.read().await.get(name).cloned();
        if let Some(cell) = cached {
            return cell;
        }
        self.channels
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    async fn channel(&self, name: &str) -> Result<Arc<dyn QueueChannel>> {
        let cell = self.cell(name).await;
        let channel = cell
            .get_or_try_init(|| self.repo.open_queue(name))
            .await?;
        Ok(channel.clone())
    }

    /// Names of the queues opened so far, sorted.
    pub async fn open_queues(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .channels
            .read()
            .await
            .iter()
            .filter(|(_, cell)| cell.initialized())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}

#[async_trait]
impl QueueClient for QueueService {
    async fn publish(&self, queue: &str, payload: QueuePayload) -> Result<()> {
        let text = payload.encode()?;
        let channel = self.channel(queue).await?;
        channel.publish(&text).await
    }

    async fn consume(&self, queue: &str, _consumer: QueueConsumer) -> Result<()> {
        Err(InfraError::NotImplemented(format!(
            "consuming from queue '{queue}'"
        )))
    }
}
