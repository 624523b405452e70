//! Key/value [`Cache`] over Redis.
//!
//! Each record is stored as JSON under its prefixed key. Prefix-wide
//! operations (`size`, `clear`, `entries`) walk the keyspace with
//! `SCAN MATCH <prefix>*`, so their cost grows with the whole keyspace, not
//! just the collection.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use vecdocs_core::cache::Cache;
use vecdocs_core::documents::KEY_PREFIX;
use vecdocs_core::{Record, StoreError};

use crate::kv::{escape_glob, KvClient, RedisClient};

/// Environment variable consulted when no URL is given.
pub const REDIS_URL_ENV: &str = "REDIS_URL";

#[derive(Clone)]
pub struct RedisCache {
    prefix: String,
    client: Arc<dyn KvClient>,
    /// Expiry in seconds for written records.
    ex: Option<i64>,
}

impl RedisCache {
    /// Connect to `url` (or `$REDIS_URL`) and check the server answers.
    pub async fn connect(
        prefix: impl Into<String>,
        url: Option<String>,
        ex: Option<i64>,
    ) -> Result<Self> {
        let url = resolve_url(url)?;
        let client = RedisClient::connect(&url).await?;
        client
            .ping()
            .await
            .with_context(|| format!("Redis at {url} did not answer PING"))?;
        debug!(%url, "connected to redis");
        Ok(Self::with_client(prefix, Arc::new(client), ex))
    }

    /// A cache over an already connected client.
    pub fn with_client(
        prefix: impl Into<String>,
        client: Arc<dyn KvClient>,
        ex: Option<i64>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            client,
            ex,
        }
    }

    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self.clone()
        }
    }

    pub fn ex(&self) -> Option<i64> {
        self.ex
    }

    pub fn client(&self) -> &Arc<dyn KvClient> {
        &self.client
    }

    /// Remaining time to live of a record, in seconds (`-1` without expiry,
    /// `-2` when absent).
    pub async fn ttl(&self, key: &str) -> Result<i64> {
        self.client.ttl(&self.pre(key)).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.client.ping().await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.client.scan(&format!("{}*", escape_glob(prefix))).await
    }

    /// Fetch and decode `keys`, skipping any that vanished since the scan.
    async fn load(&self, keys: Vec<String>) -> Result<Vec<(String, Record)>> {
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(json) = self.client.get(&key).await? {
                let record = decode(&key, &json)?;
                entries.push((key, record));
            }
        }
        Ok(entries)
    }
}

/// The explicit URL, else `$REDIS_URL`.
pub fn resolve_url(url: Option<String>) -> Result<String> {
    resolve_url_from(url, std::env::var(REDIS_URL_ENV).ok())
}

/// The explicit URL, else `env`. Blank values count as unset.
pub fn resolve_url_from(url: Option<String>, env: Option<String>) -> Result<String> {
    url.filter(|u| !u.trim().is_empty())
        .or_else(|| env.filter(|u| !u.trim().is_empty()))
        .ok_or_else(|| {
            StoreError::Configuration(format!(
                "no Redis URL configured and {REDIS_URL_ENV} is not set"
            ))
            .into()
        })
}

fn decode(key: &str, json: &str) -> Result<Record> {
    serde_json::from_str(json).with_context(|| format!("Invalid record JSON under {key}"))
}

#[async_trait]
impl Cache for RedisCache {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn set_prefix(&mut self, prefix: String) {
        self.prefix = prefix;
    }

    async fn get(&self, key: &str) -> Result<Option<Record>> {
        let key = self.pre(key);
        match self.client.get(&key).await? {
            Some(json) => Ok(Some(decode(&key, &json)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, record: &Record) -> Result<()> {
        let key = self.pre(key);
        match self.ex {
            Some(ex) if ex < 1 => {
                self.client.del(&key).await?;
            }
            ex => {
                let json = serde_json::to_string(record)?;
                self.client.set(&key, &json, ex.map(|e| e as u64)).await?;
            }
        }
        Ok(())
    }

    async fn contains_key(&self, key: &str) -> Result<bool> {
        self.client.exists(&self.pre(key)).await
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.client.del(&self.pre(key)).await
    }

    async fn size(&self) -> Result<usize> {
        Ok(self.scan_prefix(&self.prefix).await?.len())
    }

    async fn clear(&self) -> Result<()> {
        for key in self.scan_prefix(&self.prefix).await? {
            self.client.del(&key).await?;
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, Record)>> {
        let keys = self.scan_prefix(&self.prefix).await?;
        self.load(keys).await
    }

    async fn full_entries(&self) -> Result<Vec<(String, Record)>> {
        let keys = self.scan_prefix(KEY_PREFIX).await?;
        self.load(keys).await
    }
}
