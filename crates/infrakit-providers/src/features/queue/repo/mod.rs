#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;
use infrakit_core::{InfraError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// An opened, named queue.
#[async_trait]
pub trait QueueChannel: Send + Sync {
    fn name(&self) -> &str;
    async fn publish(&self, payload: &str) -> Result<()>;
}

/// Opens named queues on a broker.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueRepository: Send + Sync {
    async fn open_queue(&self, name: &str) -> Result<Arc<dyn QueueChannel>>;
}

pub struct InMemoryQueueChannel {
    name: String,
    messages: RwLock<Vec<String>>,
}

impl InMemoryQueueChannel {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            messages: RwLock::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.read().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl QueueChannel for InMemoryQueueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, payload: &str) -> Result<()> {
        let mut messages = self.messages.write().map_err(|_| {
            InfraError::BackendError(format!("queue '{}' lock poisoned", self.name))
        })?;
        messages.push(payload.to_string());
        Ok(())
    }
}

/// In-process broker keeping every published message per queue.
#[derive(Clone, Default)]
pub struct InMemoryQueueRepository {
    queues: Arc<RwLock<HashMap<String, Arc<InMemoryQueueChannel>>>>,
}

impl InMemoryQueueRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published to `name`, oldest first.
    pub fn messages(&self, name: &str) -> Vec<String> {
        self.queues
            .read()
            .ok()
            .and_then(|queues| queues.get(name).cloned())
            .map(|queue| queue.messages())
            .unwrap_or_default()
    }

    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .queues
            .read()
            .map(|queues| queues.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

#[async_trait]
impl QueueRepository for InMemoryQueueRepository {
    async fn open_queue(&self, name: &str) -> Result<Arc<dyn QueueChannel>> {
        let mut queues = self.queues.write().map_err(|_| {
            InfraError::ConnectionError("queue registry lock poisoned".to_string())
        })?;
        let queue: Arc<dyn QueueChannel> = queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(InMemoryQueueChannel::new(name)))
            .clone();
        Ok(queue)
    }
}
