//! Schema setup for the SQLite cache.
//!
//! Two tables:
//!
//! - `embeddings`: a `vec0` virtual table (sqlite-vec) holding one
//!   `float[embedding_length]` vector per rowid, indexed for cosine
//!   k-nearest-neighbor queries.
//! - `records`: the text, norm, source and JSON tag array of each record,
//!   keyed by its prefixed content key and pointing at its embedding rowid.
//!
//! All statements are idempotent; running them against an existing
//! database leaves it untouched.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

pub async fn run_migrations(pool: &SqlitePool, embedding_length: usize) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE VIRTUAL TABLE IF NOT EXISTS embeddings USING vec0(
            embedding float[{embedding_length}] distance_metric=cosine
        )
        "#
    ))
    .execute(pool)
    .await
    .context("Failed to create embeddings table")?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            key TEXT PRIMARY KEY ON CONFLICT REPLACE,
            text TEXT NOT NULL DEFAULT '',
            embedding_id INTEGER NOT NULL,
            norm REAL NOT NULL DEFAULT 0.0,
            source TEXT,
            tags TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create records table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_embedding_id ON records(embedding_id)")
        .execute(pool)
        .await?;

    debug!(embedding_length, "sqlite schema ready");
    Ok(())
}
