//! Error taxonomy for the document store.
//!
//! Fallible APIs return [`anyhow::Result`]; the variants below are the
//! failures callers may want to tell apart, recoverable with
//! `err.downcast_ref::<StoreError>()`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A required construction parameter is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A vector does not have the dimensionality the backend was built for.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedder answered a batch with the wrong number of vectors.
    #[error("embedder returned {actual} embeddings for {expected} inputs")]
    EmbeddingCount { expected: usize, actual: usize },
}
