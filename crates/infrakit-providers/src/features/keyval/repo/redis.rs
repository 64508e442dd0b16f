use async_trait::async_trait;
use infrakit_core::Result;
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue};
use std::collections::HashMap;
use std::time::Duration;

use super::KeyValRepository;
use crate::redis_conn::{backend_error, connect};

/// Key-value repository speaking the Redis command protocol.
#[derive(Clone)]
pub struct RedisKeyValRepository {
    conn: ConnectionManager,
}

impl RedisKeyValRepository {
    pub async fn connect(url: &str) -> Result<Self> {
        Ok(Self {
            conn: connect(url).await?,
        })
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        let mut conn = self.conn.clone();
        cmd.query_async::<_, T>(&mut conn)
            .await
            .map_err(backend_error)
    }
}

fn with_ttl(cmd: &mut Cmd, ttl: Option<Duration>) {
    if let Some(ttl) = ttl {
        cmd.arg("PX").arg(millis(ttl));
    }
}

/// Whole milliseconds; a non-zero TTL under 1ms is sent as 1.
fn millis(ttl: Duration) -> u64 {
    let ms = if ttl.is_zero() { 0 } else { ttl.as_millis().max(1) };
    u64::try_from(ms).unwrap_or(u64::MAX)
}

#[async_trait]
impl KeyValRepository for RedisKeyValRepository {
    async fn set(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<()> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(val);
        with_ttl(&mut cmd, ttl);
        self.query(&cmd).await
    }

    async fn set_nx(&self, key: &str, val: &str, ttl: Option<Duration>) -> Result<bool> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(val).arg("NX");
        with_ttl(&mut cmd, ttl);
        let reply: redis::Value = self.query(&cmd).await?;
        Ok(!matches!(reply, redis::Value::Nil))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("GET").arg(key)).await
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.query(redis::cmd("DEL").arg(key)).await
    }

    async fn lpush(&self, key: &str, val: &str) -> Result<()> {
        self.query(redis::cmd("LPUSH").arg(key).arg(val)).await
    }

    async fn rpush(&self, key: &str, val: &str) -> Result<()> {
        self.query(redis::cmd("RPUSH").arg(key).arg(val)).await
    }

    async fn lpop(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("LPOP").arg(key)).await
    }

    async fn rpop(&self, key: &str) -> Result<Option<String>> {
        self.query(redis::cmd("RPOP").arg(key)).await
    }

    async fn llen(&self, key: &str) -> Result<i64> {
        self.query(redis::cmd("LLEN").arg(key)).await
    }

    async fn lindex(&self, key: &str, index: i64) -> Result<Option<String>> {
        self.query(redis::cmd("LINDEX").arg(key).arg(index)).await
    }

    async fn lrange(&self, key: &str, start: i64, stop: i64) -> Result<Vec<String>> {
        self.query(redis::cmd("LRANGE").arg(key).arg(start).arg(stop))
            .await
    }

    async fn hset(&self, key: &str, values: &HashMap<String, String>) -> Result<()> {
        let mut cmd = redis::cmd("HSET");
        cmd.arg(key);
        for (field, value) in values {
            cmd.arg(field).arg(value);
        }
        self.query(&cmd).await
    }

    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        self.query(redis::cmd("HGET").arg(key).arg(field)).await
    }

    async fn hget_all(&self, key: &str) -> Result<HashMap<String, String>> {
        self.query(redis::cmd("HGETALL").arg(key)).await
    }

    async fn hdel(&self, key: &str, fields: &[String]) -> Result<()> {
        self.query(redis::cmd("HDEL").arg(key).arg(fields)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        self.query(redis::cmd("PEXPIRE").arg(key).arg(millis(ttl)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_is_sent_in_milliseconds() {
        let mut cmd = redis::cmd("SET");
        cmd.arg("k").arg("v");
        with_ttl(&mut cmd, Some(Duration::from_secs(2)));
        let packed = String::from_utf8(cmd.get_packed_command()).unwrap();
        assert!(packed.ends_with("$2\r\nPX\r\n$4\r\n2000\r\n"));

        let mut bare = redis::cmd("SET");
        with_ttl(&mut bare, None);
        assert!(!String::from_utf8(bare.get_packed_command())
            .unwrap()
            .contains("PX"));
    }

    #[test]
    fn test_sub_millisecond_ttl_rounds_up() {
        let mut cmd = redis::cmd("SET");
        cmd.arg("k").arg("v");
        with_ttl(&mut cmd, Some(Duration::from_micros(500)));
        let packed = String::from_utf8(cmd.get_packed_command()).unwrap();
        assert!(packed.ends_with("$2\r\nPX\r\n$1\r\n1\r\n"));

        assert_eq!(millis(Duration::from_micros(1500)), 1);
        assert_eq!(millis(Duration::from_millis(7)), 7);
    }

    // Needs a live server: REDIS_URL=redis://127.0.0.1:6379 cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn test_redis_repository_round_trip() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into());
        let repo = RedisKeyValRepository::connect(&url).await.unwrap();

        repo.del("infrakit:test:k").await.unwrap();
        assert_eq!(repo.get("infrakit:test:k").await.unwrap(), None);
        assert!(repo.set_nx("infrakit:test:k", "v1", None).await.unwrap());
        assert!(!repo.set_nx("infrakit:test:k", "v2", None).await.unwrap());
        assert_eq!(
            repo.get("infrakit:test:k").await.unwrap(),
            Some("v1".to_string())
        );
        repo.del("infrakit:test:k").await.unwrap();
    }
}
