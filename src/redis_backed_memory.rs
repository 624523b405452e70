//! Memory cache mirrored to Redis.
//!
//! On construction every record under `Documents-*` is pulled from Redis
//! into a local [`MemoryCache`]. Reads never leave the process after that;
//! writes, deletes and clears go to both sides.
//!
//! Expiry follows the Redis side's `ex`: with `ex < 1` a write removes the
//! record from both sides. With a positive `ex` only the Redis copy expires;
//! the local copy stays until this process ends and is simply not loaded by
//! the next bootstrap.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use vecdocs_core::cache::Cache;
use vecdocs_core::{MemoryCache, RankedRecord, Record, Tags};

use crate::redis_cache::RedisCache;

#[derive(Clone)]
pub struct RedisBackedMemoryCache {
    memory: MemoryCache,
    redis: RedisCache,
}

impl RedisBackedMemoryCache {
    pub async fn connect(
        prefix: impl Into<String>,
        url: Option<String>,
        ex: Option<i64>,
    ) -> Result<Self> {
        let redis = RedisCache::connect(prefix, url, ex).await?;
        Self::from_redis(redis).await
    }

    /// Bootstrap the local copy from `redis`, taking over its prefix.
    pub async fn from_redis(redis: RedisCache) -> Result<Self> {
        let memory = MemoryCache::new(redis.prefix());
        let loaded = memory.load(redis.full_entries().await?);
        info!(records = loaded, "loaded records from redis");
        Ok(Self { memory, redis })
    }

    pub fn memory(&self) -> &MemoryCache {
        &self.memory
    }

    pub fn redis(&self) -> &RedisCache {
        &self.redis
    }
}

#[async_trait]
impl Cache for RedisBackedMemoryCache {
    fn prefix(&self) -> &str {
        self.memory.prefix()
    }

    fn set_prefix(&mut self, prefix: String) {
        self.redis.set_prefix(prefix.clone());
        self.memory.set_prefix(prefix);
    }

    async fn get(&self, key: &str) -> Result<Option<Record>> {
        self.memory.get(key).await
    }

    async fn set(&self, key: &str, record: &Record) -> Result<()> {
        self.redis.set(key, record).await?;
        match self.redis.ex() {
            // Redis dropped the key instead of writing it.
            Some(ex) if ex < 1 => {
                self.memory.delete(key).await?;
                Ok(())
            }
            _ => self.memory.set(key, record).await,
        }
    }

    async fn contains_key(&self, key: &str) -> Result<bool> {
        self.memory.contains_key(key).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.memory.delete(key).await?;
        self.redis.delete(key).await
    }

    async fn size(&self) -> Result<usize> {
        self.memory.size().await
    }

    async fn clear(&self) -> Result<()> {
        self.redis.clear().await?;
        self.memory.clear().await
    }

    async fn entries(&self) -> Result<Vec<(String, Record)>> {
        self.memory.entries().await
    }

    async fn full_entries(&self) -> Result<Vec<(String, Record)>> {
        self.memory.full_entries().await
    }

    async fn tags(&self) -> Result<Tags> {
        self.memory.tags().await
    }

    async fn find_records(
        &self,
        needle: &[f32],
        tags: Option<&[String]>,
        max_records: Option<usize>,
    ) -> Result<Vec<RankedRecord>> {
        self.memory.find_records(needle, tags, max_records).await
    }
}
