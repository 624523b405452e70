//! Backend selection.
//!
//! [`connect_cache`] builds the [`Cache`] named by the configuration. The
//! network backends degrade to a [`MemoryCache`] when Redis cannot be
//! reached, so a store can always be opened; a missing or malformed Redis
//! URL is still an error.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};

use vecdocs_core::documents::prefix_for;
use vecdocs_core::{AddOptions, Cache, DocumentStore, Embedder, MemoryCache, StoreError};

use crate::config::{CacheBackend, Config, DocumentsConfig};
use crate::db;
use crate::embedding::OllamaEmbedder;
use crate::redis_backed_memory::RedisBackedMemoryCache;
use crate::redis_cache::RedisCache;
use crate::sqlite_cache::SqliteCache;

/// Build the configured cache under `prefix`.
pub async fn connect_cache(config: &Config, prefix: &str) -> Result<Box<dyn Cache>> {
    let backend = config.documents.backend;
    let cache: Box<dyn Cache> = match backend {
        CacheBackend::Memory => Box::new(MemoryCache::new(prefix)),
        CacheBackend::Sqlite => {
            let filename = config
                .sqlite
                .path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|| db::MEMORY.to_string());
            Box::new(SqliteCache::new(prefix, config.sqlite.embedding_length, &filename).await?)
        }
        CacheBackend::Redis => {
            let redis = RedisCache::connect(prefix, config.redis.url.clone(), config.redis.ex).await;
            match redis {
                Ok(cache) => Box::new(cache) as Box<dyn Cache>,
                Err(e) => fall_back(backend, prefix, e)?,
            }
        }
        CacheBackend::RedisBackedMemory => {
            let cache =
                RedisBackedMemoryCache::connect(prefix, config.redis.url.clone(), config.redis.ex)
                    .await;
            match cache {
                Ok(cache) => Box::new(cache) as Box<dyn Cache>,
                Err(e) => fall_back(backend, prefix, e)?,
            }
        }
    };
    info!(?backend, prefix, "cache ready");
    Ok(cache)
}

/// Replace a failed network backend with memory, unless the failure is a
/// configuration problem.
fn fall_back(backend: CacheBackend, prefix: &str, err: anyhow::Error) -> Result<Box<dyn Cache>> {
    if let Some(StoreError::Configuration(_)) = err.downcast_ref::<StoreError>() {
        return Err(err);
    }
    warn!(?backend, error = %format!("{err:#}"), "backend unavailable, falling back to memory");
    Ok(Box::new(MemoryCache::new(prefix)))
}

/// Open a document store with the Ollama embedder.
pub async fn open_documents(config: &Config) -> Result<DocumentStore> {
    let embedder = OllamaEmbedder::new(&config.embedding)?;
    open_documents_with(config, Arc::new(embedder)).await
}

/// Open a document store with a caller-supplied embedder.
pub async fn open_documents_with(
    config: &Config,
    embedder: Arc<dyn Embedder>,
) -> Result<DocumentStore> {
    let documents = &config.documents;
    let cache = connect_cache(config, &prefix_for(&documents.collection)).await?;
    let mut store = DocumentStore::new(embedder, documents.model.clone(), cache)
        .with_collection(documents.collection.clone());
    if let Some(options) = &documents.model_options {
        store = store.with_model_options(options.clone());
    }
    Ok(store)
}

impl DocumentsConfig {
    /// [`AddOptions`] carrying the configured batch size.
    pub fn add_options(&self) -> AddOptions {
        AddOptions {
            batch_size: self.batch_size,
            ..AddOptions::default()
        }
    }
}
