pub mod repo;
pub mod service;

use infrakit_core::{KeyValClient, Result};
use repo::InMemoryKeyValRepository;
use service::KeyValService;
use std::sync::Arc;
use tracing::info;

/// Factory for `memory://` URLs: a fresh in-process store per call.
pub async fn connect_memory(url: String) -> Result<Arc<dyn KeyValClient>> {
    info!(%url, "Opened in-memory keyval store");
    Ok(Arc::new(KeyValService::new(Arc::new(
        InMemoryKeyValRepository::new(),
    ))))
}

/// Factory for `redis://` URLs.
#[cfg(feature = "redis")]
pub async fn connect_redis(url: String) -> Result<Arc<dyn KeyValClient>> {
    let repo = repo::redis::RedisKeyValRepository::connect(&url).await?;
    info!(%url, "Connected redis keyval store");
    Ok(Arc::new(KeyValService::new(Arc::new(repo))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_factory_instances_are_isolated() {
        let first = connect_memory("memory://".to_string()).await.unwrap();
        let second = connect_memory("memory://".to_string()).await.unwrap();

        first.set("k", "v", None).await.unwrap();
        assert_eq!(first.get("k").await, "v");
        assert_eq!(second.get("k").await, "");
    }

    #[cfg(feature = "redis")]
    #[tokio::test]
    async fn test_redis_factory_rejects_malformed_url() {
        let err = connect_redis("redis//missing-colon".to_string())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, infrakit_core::InfraError::ParseError(_)));
    }
}
