//! The document store: embeds texts and answers similarity queries.
//!
//! [`DocumentStore`] sits between callers, an [`Embedder`], and a
//! [`Cache`] backend. Records are keyed by the SHA-256 of their text under
//! the prefix `Documents-<collection>-`, so switching collections only
//! changes which keys are visible.
//!
//! # Adding
//!
//! 1. Read every input into a string.
//! 2. Build the tag set: explicit tags plus, given a source, the source's
//!    file name (without any `?query`).
//! 3. Drop inputs whose key already exists.
//! 4. Embed the rest `batch_size` at a time, one embedder call per batch.
//! 5. Store a [`Record`] per text with its norm, source and tags.
//!
//! # Finding
//!
//! The query (optionally wrapped in a prompt template) is embedded and
//! handed to [`Cache::find_records`]. [`DocumentStore::find_where`] then
//! trims the ranked list to a character and/or record budget.

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cache::Cache;
use crate::embedding::Embedder;
use crate::error::StoreError;
use crate::record::{content_key, RankedRecord, Record};
use crate::tags::Tags;

pub const DEFAULT_COLLECTION: &str = "default";

/// Key prefix shared by every collection.
pub const KEY_PREFIX: &str = "Documents-";

/// The key prefix of a collection: `Documents-<collection>-`.
pub fn prefix_for(collection: &str) -> String {
    format!("{KEY_PREFIX}{collection}-")
}

/// Something to add: a string, or a reader that is consumed to the end.
pub enum Input {
    Text(String),
    Reader(Box<dyn Read + Send>),
}

impl Input {
    fn into_text(self) -> Result<String> {
        match self {
            Input::Text(text) => Ok(text),
            Input::Reader(mut reader) => {
                let mut text = String::new();
                reader
                    .read_to_string(&mut text)
                    .context("failed to read document input")?;
                Ok(text)
            }
        }
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Input::Text(text)
    }
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Input::Text(text.to_string())
    }
}

impl From<&String> for Input {
    fn from(text: &String) -> Self {
        Input::Text(text.clone())
    }
}

#[derive(Debug, Clone)]
pub struct AddOptions {
    /// Texts per embedder call.
    pub batch_size: usize,
    /// Provenance recorded on every record; its file name becomes a tag.
    pub source: Option<String>,
    pub tags: Vec<String>,
}

impl Default for AddOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            source: None,
            tags: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Only records sharing one of these tags are ranked.
    pub tags: Option<Vec<String>>,
    /// Template for the query; the first `%s` is replaced by it.
    pub prompt: Option<String>,
}

pub struct DocumentStore {
    embedder: Arc<dyn Embedder>,
    model: String,
    model_options: Option<serde_json::Value>,
    collection: String,
    cache: Box<dyn Cache>,
}

impl DocumentStore {
    /// Create a store on the default collection. The cache's prefix is
    /// reset to match.
    pub fn new(embedder: Arc<dyn Embedder>, model: impl Into<String>, cache: Box<dyn Cache>) -> Self {
        let mut store = Self {
            embedder,
            model: model.into(),
            model_options: None,
            collection: DEFAULT_COLLECTION.to_string(),
            cache,
        };
        store.set_collection(DEFAULT_COLLECTION);
        store
    }

    pub fn with_model_options(mut self, options: serde_json::Value) -> Self {
        self.model_options = Some(options);
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.set_collection(collection);
        self
    }

    /// Switch collections. Existing records stay where they are.
    pub fn set_collection(&mut self, collection: impl Into<String>) {
        self.collection = collection.into();
        self.cache.set_prefix(prefix_for(&self.collection));
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn cache(&self) -> &dyn Cache {
        self.cache.as_ref()
    }

    pub async fn add<I, T>(&self, inputs: I, options: AddOptions) -> Result<&Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<Input>,
    {
        let mut tags = Tags::new(&options.tags, options.source.as_deref());
        if let Some(source) = options.source.as_deref() {
            tags.add(source_tag(source), Some(source));
        }
        let tags = tags.to_vec();

        let mut texts = Vec::new();
        for input in inputs {
            let text = input.into().into_text()?;
            if !self.exists(&text).await? {
                texts.push(text);
            }
        }
        if texts.is_empty() {
            return Ok(self);
        }

        let batch_size = options.batch_size.max(1);
        info!(
            count = texts.len(),
            batches = texts.len().div_ceil(batch_size),
            collection = %self.collection,
            "adding documents"
        );
        for batch in texts.chunks(batch_size) {
            let embeddings = self
                .embedder
                .embed(&self.model, batch, self.model_options.as_ref())
                .await?;
            if embeddings.len() != batch.len() {
                return Err(StoreError::EmbeddingCount {
                    expected: batch.len(),
                    actual: embeddings.len(),
                }
                .into());
            }
            for (text, embedding) in batch.iter().zip(embeddings) {
                let embedding = self.cache.convert_to_vector(embedding);
                let record = Record::new(
                    text.clone(),
                    embedding,
                    options.source.clone(),
                    tags.clone(),
                );
                self.set(text, &record).await?;
            }
            debug!(size = batch.len(), "embedded batch");
        }
        Ok(self)
    }

    pub async fn get(&self, text: &str) -> Result<Option<Record>> {
        self.cache.get(&content_key(text)).await
    }

    pub async fn set(&self, text: &str, record: &Record) -> Result<()> {
        self.cache.set(&content_key(text), record).await
    }

    pub async fn exists(&self, text: &str) -> Result<bool> {
        self.cache.contains_key(&content_key(text)).await
    }

    pub async fn delete(&self, text: &str) -> Result<bool> {
        self.cache.delete(&content_key(text)).await
    }

    pub async fn size(&self) -> Result<usize> {
        self.cache.size().await
    }

    /// Remove the records sharing one of `tags`, or the whole collection
    /// when `tags` is empty.
    pub async fn clear<S: AsRef<str>>(&self, tags: &[S]) -> Result<&Self> {
        let tags = Tags::new(tags, None).to_vec();
        if tags.is_empty() {
            self.cache.clear().await?;
        } else {
            self.cache.clear_tags(&tags).await?;
        }
        Ok(self)
    }

    /// Records most similar to `query` first.
    pub async fn find(&self, query: &str, options: &FindOptions) -> Result<Vec<RankedRecord>> {
        let needle = self.embed_query(query, options.prompt.as_deref()).await?;
        let tags = options
            .tags
            .as_ref()
            .map(|tags| Tags::new(tags, None).to_vec());
        self.cache
            .find_records(&needle, tags.as_deref(), None)
            .await
    }

    /// The leading records of [`find`](Self::find) whose texts fit in
    /// `text_size` characters in total and that number at most
    /// `text_count`. Stops at the first record over either budget.
    pub async fn find_where(
        &self,
        query: &str,
        text_size: Option<usize>,
        text_count: Option<usize>,
        options: &FindOptions,
    ) -> Result<Vec<RankedRecord>> {
        let records = self.find(query, options).await?;
        let mut size = 0;
        let mut count = 0;
        Ok(records
            .into_iter()
            .take_while(|ranked| {
                if let Some(limit) = text_size {
                    size += ranked.record.text.chars().count();
                    if size > limit {
                        return false;
                    }
                }
                if let Some(limit) = text_count {
                    count += 1;
                    if count > limit {
                        return false;
                    }
                }
                true
            })
            .collect())
    }

    /// The default collection followed by every collection found in the
    /// backend.
    pub async fn collections(&self) -> Result<Vec<String>> {
        let mut names = vec![DEFAULT_COLLECTION.to_string()];
        for name in self.cache.collections(KEY_PREFIX).await? {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        Ok(names)
    }

    pub async fn tags(&self) -> Result<Tags> {
        self.cache.tags().await
    }

    async fn embed_query(&self, query: &str, prompt: Option<&str>) -> Result<Vec<f32>> {
        let input = match prompt {
            Some(prompt) => prompt.replacen("%s", query, 1),
            None => query.to_string(),
        };
        let mut embeddings = self
            .embedder
            .embed(&self.model, &[input], self.model_options.as_ref())
            .await?;
        if embeddings.len() != 1 {
            return Err(StoreError::EmbeddingCount {
                expected: 1,
                actual: embeddings.len(),
            }
            .into());
        }
        let needle = embeddings.swap_remove(0);
        Ok(self.cache.convert_to_vector(needle))
    }
}

/// File name of a source path or URL, without any query string.
fn source_tag(source: &str) -> &str {
    let name = source
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(source);
    name.split('?').next().unwrap_or(name)
}
