pub mod repo;
pub mod service;

use infrakit_core::{QueueClient, Result};
use repo::InMemoryQueueRepository;
use service::QueueService;
use std::sync::Arc;
use tracing::info;

/// Factory for `memory://` URLs: a private in-process broker per call.
pub async fn connect_memory(url: String) -> Result<Arc<dyn QueueClient>> {
    info!(%url, "Opened in-memory queue broker");
    Ok(Arc::new(QueueService::new(Arc::new(
        InMemoryQueueRepository::new(),
    ))))
}

/// Factory for `redis://` URLs. The connection is established up front.
#[cfg(feature = "redis")]
pub async fn connect_redis(url: String) -> Result<Arc<dyn QueueClient>> {
    let repo = repo::redis::RedisQueueRepository::connect(&url).await?;
    info!(%url, "Connected redis queue broker");
    Ok(Arc::new(QueueService::new(Arc::new(repo))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_factory_accepts_publish() {
        let queue = connect_memory("memory://".to_string()).await.unwrap();
        queue.publish("jobs", "hello".into()).await.unwrap();
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_redis_factory_rejects_malformed_url() {
        let err = connect_redis("not a url".to_string()).await.err().unwrap();
        assert!(matches!(err, infrakit_core::InfraError::ParseError(_)));
    }
}
