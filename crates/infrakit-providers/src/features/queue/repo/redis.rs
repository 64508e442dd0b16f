use async_trait::async_trait;
use infrakit_core::{InfraError, Result};
use redis::aio::ConnectionManager;
use std::sync::Arc;

use super::{QueueChannel, QueueRepository};
use crate::redis_conn::{backend_error, connect};

/// Set holding the name of every queue ever opened.
pub const QUEUES_KEY: &str = "rmq::queues";

/// List a queue's publishers push onto.
pub fn ready_key(queue: &str) -> String {
    format!("rmq::queue::[{queue}]::ready")
}

/// Queue broker on Redis lists, using the rmq key layout.
#[derive(Clone)]
pub struct RedisQueueRepository {
    conn: ConnectionManager,
}

impl RedisQueueRepository {
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self {
            conn: connect(url).await?,
        })
    }
}

#[async_trait]
impl QueueRepository for RedisQueueRepository {
    async fn open_queue(&self, name: &str) -> Result<Arc<dyn QueueChannel>> {
        let mut conn = self.conn.clone();
        redis::cmd("SADD")
            .arg(QUEUES_KEY)
            .arg(name)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| InfraError::ConnectionError(format!("unable to open queue '{name}': {e}")))?;

        Ok(Arc::new(RedisQueueChannel {
            name: name.to_string(),
            ready_key: ready_key(name),
            conn: self.conn.clone(),
        }))
    }
}

pub struct RedisQueueChannel {
    name: String,
    ready_key: String,
    conn: ConnectionManager,
}

#[async_trait]
impl QueueChannel for RedisQueueChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn publish(&self, payload: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("LPUSH")
            .arg(&self.ready_key)
            .arg(payload)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(backend_error)
    }
}
