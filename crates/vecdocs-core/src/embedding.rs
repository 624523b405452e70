//! The embedding capability consumed by the store and the semantic splitter.
//!
//! Concrete providers (the Ollama HTTP client) live in the `vecdocs` app
//! crate; tests use in-process fakes.

use anyhow::Result;
use async_trait::async_trait;

/// Turns texts into vectors.
///
/// Implementations must return exactly one vector per input, in input
/// order, with the same dimensionality on every call for a given model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(
        &self,
        model: &str,
        input: &[String],
        options: Option<&serde_json::Value>,
    ) -> Result<Vec<Vec<f32>>>;
}
