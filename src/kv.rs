//! String key/value access used by the Redis-backed caches.
//!
//! [`KvClient`] covers the handful of commands the caches issue, so tests
//! can swap in an in-process map for a live server.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use vecdocs_core::StoreError;

#[async_trait]
pub trait KvClient: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`, expiring after `ex` seconds when given.
    async fn set(&self, key: &str, value: &str, ex: Option<u64>) -> Result<()>;

    /// Returns `true` when the key existed.
    async fn del(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remaining time to live in seconds; `-1` without expiry, `-2` when
    /// the key does not exist.
    async fn ttl(&self, key: &str) -> Result<i64>;

    /// Every key matching the glob `pattern`, each listed once.
    async fn scan(&self, pattern: &str) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<()>;
}

/// [`KvClient`] over a multiplexed Redis connection.
#[derive(Clone)]
pub struct RedisClient {
    connection: MultiplexedConnection,
}

impl RedisClient {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| StoreError::Configuration(format!("invalid Redis URL {url}: {e}")))?;
        let connection = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("Failed to connect to Redis at {url}"))?;
        Ok(Self { connection })
    }
}

#[async_trait]
impl KvClient for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ex: Option<u64>) -> Result<()> {
        let mut conn = self.connection.clone();
        let () = match ex {
            Some(seconds) => conn.set_ex(key, value, seconds).await?,
            None => conn.set(key, value).await?,
        };
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: i64 = conn.del(key).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let mut conn = self.connection.clone();
        let ttl: i64 = conn.ttl(key).await?;
        Ok(ttl)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>> {
        let mut conn = self.connection.clone();
        let mut iter: redis::AsyncIter<String> = conn.scan_match(pattern).await?;
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        // SCAN may return a key more than once
        while let Some(key) = iter.next_item().await {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}

/// Escape glob metacharacters so `value` matches literally in a `MATCH`
/// pattern.
pub fn escape_glob(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("Documents-default-"), "Documents-default-");
        assert_eq!(escape_glob("a*b?[c]"), r"a\*b\?\[c\]");
    }

    #[tokio::test]
    async fn test_invalid_url_is_configuration_error() {
        let err = RedisClient::connect("not a url").await.err().unwrap();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::Configuration(_))
        ));
    }
}
