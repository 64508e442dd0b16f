use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

use crate::Result;

/// Capability contract for a string-keyed store.
///
/// Read-style operations never fail: a missing key, a type mismatch or an
/// unparsable integer all come back as the zero value (`""`, `0`, empty,
/// `false`). Only write-style operations report errors.
#[async_trait]
pub trait KeyValClient: Send + Sync {
    /// Stores `val` under `key`. A `None` or zero `ttl` keeps the key forever.
    async fn set(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<()>;
    /// Stores `val` only when `key` is absent; returns whether this call won.
    async fn set_nx(&self, key: &str, val: &str, ttl: Option<Duration>) -> bool;
    async fn get(&self, key: &str) -> String;
    async fn get_int(&self, key: &str) -> i64;
    async fn del(&self, key: &str) -> Result<()>;

    async fn lpush(&self, key: &str, val: &str) -> Result<()>;
    async fn rpush(&self, key: &str, val: &str) -> Result<()>;
    async fn lpop(&self, key: &str) -> String;
    async fn lpop_int(&self, key: &str) -> i64;
    async fn rpop(&self, key: &str) -> String;
    async fn rpop_int(&self, key: &str) -> i64;
    async fn len(&self, key: &str) -> i64;
    async fn at_index(&self, key: &str, index: i64) -> String;
    async fn at_index_int(&self, key: &str, index: i64) -> i64;
    /// Inclusive slice; negative indices count from the tail.
    async fn range(&self, key: &str, start: i64, stop: i64) -> Vec<String>;

    /// Writes every field of `values` in a single backend call.
    async fn hset(&self, key: &str, values: &HashMap<String, String>) -> Result<()>;
    async fn hget(&self, key: &str, field: &str) -> String;
    async fn hget_all(&self, key: &str) -> HashMap<String, String>;
    async fn hdel(&self, key: &str, fields: &[String]) -> Result<()>;

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}
