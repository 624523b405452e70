//! SQLite-backed [`Cache`] implementation.
//!
//! Embeddings live in a sqlite-vec `vec0` virtual table; records point at
//! their embedding's rowid. Writes of one record (embedding row plus record
//! row) happen in a single transaction.
//!
//! [`find_records`](Cache::find_records) narrows the candidates in SQL
//! first (key prefix plus a `LIKE` match of each tag against the JSON tag
//! array), re-checks the tags exactly, then asks the vector index for the
//! `k` nearest of those rows (`embedding MATCH ? AND k = ?`). The hits are
//! scored with the stored norms like every other backend. [`clear_tags`](Cache::clear_tags) uses the `LIKE` match on
//! its own, so a tag that is a substring of a stored tag matches too:
//! clearing `"a"` also removes records tagged `"abc"`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use vecdocs_core::cache::{rank, Cache};
use vecdocs_core::documents::KEY_PREFIX;
use vecdocs_core::vector::{blob_to_vec, vec_to_blob};
use vecdocs_core::{RankedRecord, Record, StoreError, Tags};

use crate::{db, migrate};

/// Upper bound on the number of records ranked by one query (the largest
/// `k` a `vec0` query accepts).
pub const MAX_K: usize = 4096;

pub const DEFAULT_EMBEDDING_LENGTH: usize = 1024;

const SELECT_RECORDS: &str = r#"
    SELECT r.key, r.text, r.norm, r.source, r.tags, e.embedding
    FROM records r
    JOIN embeddings e ON e.rowid = r.embedding_id
"#;

const NEAREST_RECORDS: &str = r#"
    SELECT r.key, r.text, r.norm, r.source, r.tags, e.embedding
    FROM (
        SELECT rowid, embedding
        FROM embeddings
        WHERE embedding MATCH ?
          AND k = ?
          AND rowid IN (SELECT value FROM json_each(?))
    ) e
    JOIN records r ON r.embedding_id = e.rowid
"#;

/// SQLite implementation of the [`Cache`] trait.
///
/// Clones share the connection pool, so [`with_prefix`](Self::with_prefix)
/// gives a view of the same database under another collection.
#[derive(Debug, Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
    prefix: String,
    embedding_length: usize,
    filename: String,
}

impl SqliteCache {
    /// Open (creating if needed) the database at `filename`, or an
    /// in-memory database for [`db::MEMORY`], and set up the schema.
    pub async fn new(
        prefix: impl Into<String>,
        embedding_length: usize,
        filename: &str,
    ) -> Result<Self> {
        if embedding_length == 0 {
            return Err(
                StoreError::Configuration("embedding_length must be > 0".to_string()).into(),
            );
        }
        let pool = db::connect(filename).await?;
        migrate::run_migrations(&pool, embedding_length).await?;
        Ok(Self {
            pool,
            prefix: prefix.into(),
            embedding_length,
            filename: filename.to_string(),
        })
    }

    /// In-memory database with 1024-dimensional embeddings.
    pub async fn in_memory(prefix: impl Into<String>) -> Result<Self> {
        Self::new(prefix, DEFAULT_EMBEDDING_LENGTH, db::MEMORY).await
    }

    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self.clone()
        }
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn embedding_length(&self) -> usize {
        self.embedding_length
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn check_dimension(&self, actual: usize) -> Result<()> {
        if actual != self.embedding_length {
            return Err(StoreError::DimensionMismatch {
                expected: self.embedding_length,
                actual,
            }
            .into());
        }
        Ok(())
    }

    fn key_pattern(&self) -> String {
        format!("{}%", escape_like(&self.prefix))
    }

    /// `(key, tags, embedding_id)` of the records under the prefix whose
    /// JSON tag array contains one of `tags` as a substring. No tags means
    /// no tag condition.
    async fn candidates(&self, tags: &[String]) -> Result<Vec<(String, Vec<String>, i64)>> {
        let mut sql =
            String::from(r"SELECT key, tags, embedding_id FROM records WHERE key LIKE ? ESCAPE '\'");
        if !tags.is_empty() {
            let conditions = vec![r"tags LIKE ? ESCAPE '\'"; tags.len()].join(" OR ");
            sql.push_str(&format!(" AND ({conditions})"));
        }

        let mut query = sqlx::query(&sql).bind(self.key_pattern());
        for tag in tags {
            query = query.bind(format!("%{}%", escape_like(tag)));
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| -> Result<(String, Vec<String>, i64)> {
                let tags: String = row.try_get("tags")?;
                let tags: Vec<String> =
                    serde_json::from_str(&tags).context("Invalid tags column")?;
                Ok((row.try_get("key")?, tags, row.try_get("embedding_id")?))
            })
            .collect()
    }

    async fn fetch_where(&self, condition: &str, bind: String) -> Result<Vec<(String, Record)>> {
        let sql = format!("{SELECT_RECORDS} WHERE {condition}");
        let rows = sqlx::query(&sql).bind(bind).fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    /// Delete records by backend key together with their embeddings.
    /// Returns the number of records removed.
    async fn delete_keys(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await?;
        let embedding_ids: Vec<i64> = sqlx::query_scalar(
            "DELETE FROM records WHERE key IN (SELECT value FROM json_each(?)) RETURNING embedding_id",
        )
        .bind(serde_json::to_string(keys)?)
        .fetch_all(&mut *tx)
        .await?;
        for id in &embedding_ids {
            sqlx::query("DELETE FROM embeddings WHERE rowid = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(embedding_ids.len())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<(String, Record)> {
    let key: String = row.try_get("key")?;
    let norm: f64 = row.try_get("norm")?;
    let tags: String = row.try_get("tags")?;
    let blob: Vec<u8> = row.try_get("embedding")?;
    let record = Record {
        text: row.try_get("text")?,
        embedding: blob_to_vec(&blob),
        norm: norm as f32,
        source: row.try_get("source")?,
        tags: serde_json::from_str(&tags).context("Invalid tags column")?,
    };
    Ok((key, record))
}

/// Escape `LIKE` wildcards so `value` matches literally (with `ESCAPE '\'`).
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl Cache for SqliteCache {
    fn prefix(&self) -> &str {
        &self.prefix
    }

    fn set_prefix(&mut self, prefix: String) {
        self.prefix = prefix;
    }

    async fn get(&self, key: &str) -> Result<Option<Record>> {
        let sql = format!("{SELECT_RECORDS} WHERE r.key = ?");
        let row = sqlx::query(&sql)
            .bind(self.pre(key))
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| record_from_row(&row).map(|(_, record)| record))
            .transpose()
    }

    async fn set(&self, key: &str, record: &Record) -> Result<()> {
        self.check_dimension(record.embedding.len())?;
        let key = self.pre(key);
        let mut tx = self.pool.begin().await?;

        let old: Option<i64> = sqlx::query_scalar("SELECT embedding_id FROM records WHERE key = ?")
            .bind(&key)
            .fetch_optional(&mut *tx)
            .await?;

        let embedding_id = sqlx::query("INSERT INTO embeddings (embedding) VALUES (?)")
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

        sqlx::query(
            "INSERT INTO records (key, text, embedding_id, norm, source, tags) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&key)
        .bind(&record.text)
        .bind(embedding_id)
        .bind(record.norm as f64)
        .bind(&record.source)
        .bind(serde_json::to_string(&record.tags)?)
        .execute(&mut *tx)
        .await?;

        if let Some(old) = old {
            sqlx::query("DELETE FROM embeddings WHERE rowid = ?")
                .bind(old)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn contains_key(&self, key: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE key = ?")
            .bind(self.pre(key))
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.delete_keys(&[self.pre(key)]).await? > 0)
    }

    async fn size(&self) -> Result<usize> {
        let count: i64 =
            sqlx::query_scalar(r"SELECT COUNT(*) FROM records WHERE key LIKE ? ESCAPE '\'")
                .bind(self.key_pattern())
                .fetch_one(&self.pool)
                .await?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        let keys: Vec<String> =
            sqlx::query_scalar(r"SELECT key FROM records WHERE key LIKE ? ESCAPE '\'")
                .bind(self.key_pattern())
                .fetch_all(&self.pool)
                .await?;
        self.delete_keys(&keys).await?;
        Ok(())
    }

    async fn clear_tags(&self, tags: &[String]) -> Result<()> {
        let tags = Tags::new(tags, None).to_vec();
        if tags.is_empty() {
            return Ok(());
        }
        let keys: Vec<String> = self
            .candidates(&tags)
            .await?
            .into_iter()
            .map(|(key, _, _)| key)
            .collect();
        self.delete_keys(&keys).await?;
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, Record)>> {
        self.fetch_where(r"r.key LIKE ? ESCAPE '\'", self.key_pattern())
            .await
    }

    async fn full_entries(&self) -> Result<Vec<(String, Record)>> {
        self.fetch_where(r"r.key LIKE ? ESCAPE '\'", format!("{}%", escape_like(KEY_PREFIX)))
            .await
    }

    async fn find_records(
        &self,
        needle: &[f32],
        tags: Option<&[String]>,
        max_records: Option<usize>,
    ) -> Result<Vec<RankedRecord>> {
        self.check_dimension(needle.len())?;
        let size = self.size().await?;
        let k = max_records.unwrap_or(MAX_K).min(size).min(MAX_K);

        let tags = tags.map(|t| Tags::new(t, None).to_vec()).unwrap_or_default();
        let ids: Vec<i64> = self
            .candidates(&tags)
            .await?
            .into_iter()
            .filter(|(_, record_tags, _)| {
                tags.is_empty() || tags.iter().any(|t| record_tags.contains(t))
            })
            .map(|(_, _, id)| id)
            .collect();
        if ids.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(NEAREST_RECORDS)
            .bind(vec_to_blob(needle))
            .bind(k as i64)
            .bind(serde_json::to_string(&ids)?)
            .fetch_all(&self.pool)
            .await?;
        let candidates = rows
            .iter()
            .map(record_from_row)
            .collect::<Result<Vec<_>>>()?
            .into_iter()
            .map(|(key, record)| (self.unpre(&key).to_string(), record));
        Ok(rank(needle, candidates, None, Some(k)))
    }
}
