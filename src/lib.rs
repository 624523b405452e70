//! # vecdocs
//!
//! **An embedding cache and similarity-search document store.**
//!
//! Texts are embedded through an [`Embedder`], stored as [`Record`]s keyed
//! by the SHA-256 of their text, and ranked by cosine similarity against a
//! query embedding. Records carry a source and a set of tags; queries and
//! deletions can be restricted to records sharing a tag.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────┐   ┌────────────────────────────┐
//! │ Splitter │──▶│ DocumentStore │──▶│ Cache                      │
//! │ Char/Sem │   │ add / find    │   │ Memory | Redis             │
//! └──────────┘   └───────┬───────┘   │ RedisBackedMemory | SQLite │
//!                        │           └────────────────────────────┘
//!                        ▼
//!                 ┌─────────────┐
//!                 │  Embedder   │
//!                 │ (Ollama)    │
//!                 └─────────────┘
//! ```
//!
//! The pure pieces (records, tags, vector math, the [`Cache`] trait with
//! its memory backend, splitters, [`DocumentStore`]) live in
//! [`vecdocs_core`] and are re-exported here. This crate adds the native
//! backends and the wiring.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connect`] | Backend selection with memory fallback |
//! | [`db`] | SQLite connection pool |
//! | [`migrate`] | SQLite schema |
//! | [`sqlite_cache`] | SQLite-backed cache |
//! | [`kv`] | Key/value client abstraction over Redis |
//! | [`redis_cache`] | Redis-backed cache |
//! | [`redis_backed_memory`] | Memory cache mirrored to Redis |
//! | [`embedding`] | Ollama embedding client |

pub mod config;
pub mod connect;
pub mod db;
pub mod embedding;
pub mod kv;
pub mod migrate;
pub mod redis_backed_memory;
pub mod redis_cache;
pub mod sqlite_cache;

pub use vecdocs_core::{
    cache, documents, record, splitter, tags, vector, AddOptions, Cache, DocumentStore, Embedder,
    FindOptions, Input, MemoryCache, RankedRecord, Record, StoreError, Tag, Tags,
};

pub use config::CacheBackend;
pub use connect::{connect_cache, open_documents};
pub use redis_backed_memory::RedisBackedMemoryCache;
pub use redis_cache::RedisCache;
pub use sqlite_cache::SqliteCache;
