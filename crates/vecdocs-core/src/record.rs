//! The stored unit of the document store and its query-time wrapper.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::tags::Tags;
use crate::vector;

/// Lowercase hex SHA-256 of `text`: the lookup key of a record.
///
/// Identical texts share a key, so writing the same text twice replaces the
/// earlier record.
pub fn content_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A text fragment with its embedding, provenance and tags.
///
/// Serialized to JSON by the key/value backend; every field has a default
/// so partially written entries still decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Record {
    pub text: String,
    pub embedding: Vec<f32>,
    /// Euclidean norm of `embedding`, computed at write time.
    pub norm: f32,
    pub source: Option<String>,
    pub tags: Vec<String>,
}

impl Record {
    /// Build a record, computing `norm` from `embedding`.
    pub fn new(
        text: impl Into<String>,
        embedding: Vec<f32>,
        source: Option<String>,
        tags: Vec<String>,
    ) -> Self {
        let norm = vector::norm(&embedding);
        Self {
            text: text.into(),
            embedding,
            norm,
            source,
            tags,
        }
    }

    pub fn key(&self) -> String {
        content_key(&self.text)
    }

    /// The record's tags as a [`Tags`] set carrying the record's source.
    pub fn tag_set(&self) -> Tags {
        Tags::new(&self.tags, self.source.as_deref())
    }

    fn write_inspect(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#<Record {:?}", self.text)?;
        let tags = self.tag_set();
        if !tags.is_empty() {
            write!(f, " {tags}")?;
        }
        Ok(())
    }
}

/// Records are equal when their texts are, which is also when their keys
/// are.
impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Record {}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_inspect(f)?;
        f.write_str(">")
    }
}

/// A query result: the stored record, its (unprefixed) key, and its
/// similarity to the needle.
#[derive(Debug, Clone)]
pub struct RankedRecord {
    pub key: String,
    pub record: Record,
    pub similarity: f32,
}

impl fmt::Display for RankedRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.record.write_inspect(f)?;
        write!(f, " {:?}>", self.similarity)
    }
}
