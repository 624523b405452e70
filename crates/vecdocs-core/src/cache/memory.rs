//! In-memory [`Cache`] implementation.
//!
//! Uses a `HashMap` behind `std::sync::RwLock` for thread safety. The map
//! is shared between clones, so caches for different collections can sit on
//! one map; every prefixed operation only touches its own keys. Similarity
//! search is the brute-force default of [`Cache::find_records`].

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use async_trait::async_trait;

use crate::record::Record;

use super::Cache;

/// In-memory cache, also the fallback when a network backend is down.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    prefix: String,
    map: Arc<RwLock<HashMap<String, Record>>>,
}

impl MemoryCache {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            map: Arc::default(),
        }
    }

    /// A cache over the same map under another prefix.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            map: Arc::clone(&self.map),
        }
    }

    /// Insert entries under their full backend keys, bypassing the prefix.
    pub fn load<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, Record)>,
    {
        let mut map = self.write();
        let before = map.len();
        map.extend(entries);
        map.len() - before
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Record>> {
        self.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Record>> {
        self.map.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl Cache for MemoryCache {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn set_prefix(&mut self, prefix: String) {
        self.prefix = prefix;
    }

    async fn get(&self, key: &str) -> Result<Option<Record>> {
        Ok(self.read().get(&self.pre(key)).cloned())
    }

    async fn set(&self, key: &str, record: &Record) -> Result<()> {
        let key = self.pre(key);
        self.write().insert(key, record.clone());
        Ok(())
    }

    async fn contains_key(&self, key: &str) -> Result<bool> {
        Ok(self.read().contains_key(&self.pre(key)))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let key = self.pre(key);
        Ok(self.write().remove(&key).is_some())
    }

    async fn size(&self) -> Result<usize> {
        Ok(self
            .read()
            .keys()
            .filter(|k| k.starts_with(&self.prefix))
            .count())
    }

    async fn clear(&self) -> Result<()> {
        self.write().retain(|k, _| !k.starts_with(&self.prefix));
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, Record)>> {
        Ok(self
            .read()
            .iter()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect())
    }

    async fn full_entries(&self) -> Result<Vec<(String, Record)>> {
        Ok(self
            .read()
            .iter()
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect())
    }
}
