use crate::features::keyval::repo::KeyValRepository;
use async_trait::async_trait;
use infrakit_core::{KeyValClient, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// [`KeyValClient`] over any [`KeyValRepository`].
///
/// All read-side failures are collapsed to zero values in [`or_zero`] and
/// [`int_or_zero`]; writes pass the backend's error through.
pub struct KeyValService {
    repo: Arc<dyn KeyValRepository>,
}

impl KeyValService {
    pub fn new(repo: Arc<dyn KeyValRepository>) -> Self {
        Self { repo }
    }
}

/// The one place a failed or empty read becomes a default value.
fn or_zero<T: Default>(read: Result<Option<T>>) -> T {
    match read {
        Ok(Some(value)) => value,
        Ok(None) | Err(_) => T::default(),
    }
}

/// Like [`or_zero`], but also treats a non-numeric value as absent.
fn int_or_zero(read: Result<Option<String>>) -> i64 {
    or_zero(read).parse().unwrap_or(0)
}

/// A zero TTL means "never expire".
fn effective_ttl(ttl: Option<Duration>) -> Option<Duration> {
    ttl.filter(|ttl| !ttl.is_zero())
}

#[async_trait]
impl KeyValClient for KeyValService {
    async fn set(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<()> {
        self.repo.set(key, val, effective_ttl(ttl)).await
    }

    async fn set_nx(&self, key: &str, val: &str, ttl: Option<Duration>) -> bool {
        let won = self.repo.set_nx(key, val, effective_ttl(ttl)).await;
        or_zero(won.map(Some))
    }

    async fn get(&self, key: &str) -> String {
        or_zero(self.repo.get(key).await)
    }

    async fn get_int(&self, key: &str) -> i64 {
        int_or_zero(self.repo.get(key).await)
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.repo.del(key).await
    }

    async fn lpush(&self, key: &str, val: &str) -> Result<()> {
        self.repo.lpush(key, val).await
    }

    async fn rpush(&self, key: &str, val: &str) -> Result<()> {
        self.repo.rpush(key, val).await
    }

    async fn lpop(&self, key: &str) -> String {
        or_zero(self.repo.lpop(key).await)
    }

    async fn lpop_int(&self, key: &str) -> i64 {
        int_or_zero(self.repo.lpop(key).await)
    }

    async fn rpop(&self, key: &str) -> String {
        or_zero(self.repo.rpop(key).await)
    }

    async fn rpop_int(&self, key: &str) -> i64 {
        int_or_zero(self.repo.rpop(key).await)
    }

    async fn len(&self, key: &str) -> i64 {
        or_zero(self.repo.llen(key).await.map(Some))
    }

    async fn at_index(&self, key: &str, index: i64) -> String {
        or_zero(self.repo.lindex(key, index).await)
    }

    async fn at_index_int(&self, key: &str, index: i64) -> i64 {
        int_or_zero(self.repo.lindex(key, index).await)
    }

    async fn range(&self, key: &str, start: i64, stop: i64) -> Vec<String> {
        or_zero(self.repo.lrange(key, start, stop).await.map(Some))
    }

    async fn hset(&self, key: &str, values: &HashMap<String, String>) -> Result<()> {
        if values.is_empty() {
            return Ok(());
        }
        self.repo.hset(key, values).await
    }

    async fn hget(&self, key: &str, field: &str) -> String {
        or_zero(self.repo.hget(key, field).await)
    }

    async fn hget_all(&self, key: &str) -> HashMap<String, String> {
        or_zero(self.repo.hget_all(key).await.map(Some))
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        self.repo.hdel(key, fields).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.repo.expire(key, ttl).await
    }
}
