//! # vecdocs core
//!
//! Shared logic for vecdocs: records and tag sets, vector math, the
//! [`Cache`](cache::Cache) abstraction with its in-memory backend, the text
//! splitters, the [`Embedder`](embedding::Embedder) trait, and the
//! [`DocumentStore`](documents::DocumentStore) orchestrator.
//!
//! This crate contains no sqlx, redis, or HTTP dependencies. Those backends
//! live in the `vecdocs` app crate and plug in through the same traits.

pub mod cache;
pub mod documents;
pub mod embedding;
pub mod error;
pub mod record;
pub mod splitter;
pub mod tags;
pub mod vector;

pub use cache::{memory::MemoryCache, Cache};
pub use documents::{AddOptions, DocumentStore, FindOptions, Input};
pub use embedding::Embedder;
pub use error::StoreError;
pub use record::{content_key, RankedRecord, Record};
pub use tags::{Tag, Tags};
