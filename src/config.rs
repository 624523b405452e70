//! TOML configuration for a document store.
//!
//! ```toml
//! [documents]
//! model = "mxbai-embed-large"
//! collection = "default"
//! batch_size = 10
//! backend = "sqlite"          # memory | redis | redis_backed_memory | sqlite
//! model_options = { num_ctx = 8192 }
//!
//! [embedding]
//! url = "http://localhost:11434"
//! timeout_secs = 30
//! max_retries = 5
//!
//! [redis]
//! url = "redis://localhost:6379"   # falls back to REDIS_URL
//! ex = 3600
//!
//! [sqlite]
//! path = "data/documents.sqlite"   # ":memory:" when omitted
//! embedding_length = 1024
//! ```
//!
//! Only `[documents].model` is required.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub sqlite: SqliteConfig,
}

/// Which [`Cache`](vecdocs_core::Cache) implementation backs the store.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
    RedisBackedMemory,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    pub model: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub backend: CacheBackend,
    /// Passed verbatim to the embedder as `options`.
    #[serde(default)]
    pub model_options: Option<serde_json::Value>,
}

fn default_collection() -> String {
    vecdocs_core::documents::DEFAULT_COLLECTION.to_string()
}
fn default_batch_size() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_url")]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            url: default_embedding_url(),
            timeout_secs: 30,
            max_retries: 5,
        }
    }
}

fn default_embedding_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    /// Falls back to the `REDIS_URL` environment variable.
    #[serde(default)]
    pub url: Option<String>,
    /// Expiry in seconds for written records.
    #[serde(default)]
    pub ex: Option<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqliteConfig {
    /// Database file; an in-memory database when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_embedding_length")]
    pub embedding_length: usize,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            embedding_length: default_embedding_length(),
        }
    }
}

fn default_embedding_length() -> usize {
    1024
}

/// Read, parse and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.documents.model.trim().is_empty() {
        anyhow::bail!("documents.model must not be empty");
    }
    if config.documents.batch_size == 0 {
        anyhow::bail!("documents.batch_size must be > 0");
    }
    if config.sqlite.embedding_length == 0 {
        anyhow::bail!("sqlite.embedding_length must be > 0");
    }
    if let Some(options) = &config.documents.model_options {
        if !options.is_object() {
            anyhow::bail!("documents.model_options must be a table");
        }
    }

    Ok(config)
}
