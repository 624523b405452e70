//! Storage abstraction for the document store.
//!
//! The [`Cache`] trait is the contract every backend implements: keyed
//! record access scoped by a prefix, scans within and across collections,
//! and nearest-neighbor lookup. Backends that have nothing better to offer
//! inherit the scan-based defaults for [`find_records`](Cache::find_records),
//! [`tags`](Cache::tags), [`collections`](Cache::collections) and
//! [`clear_tags`](Cache::clear_tags).
//!
//! Keys passed to keyed operations are unprefixed content keys; keys
//! returned by [`entries`](Cache::entries) and
//! [`full_entries`](Cache::full_entries) are the full backend keys.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::record::{RankedRecord, Record};
use crate::tags::Tags;
use crate::vector;

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get`](Cache::get) / [`set`](Cache::set) / [`delete`](Cache::delete) | Keyed access under the prefix |
/// | [`size`](Cache::size) / [`clear`](Cache::clear) | Whole-collection operations |
/// | [`entries`](Cache::entries) | Scan of the current collection |
/// | [`full_entries`](Cache::full_entries) | Scan of every collection |
/// | [`find_records`](Cache::find_records) | Similarity search, descending |
#[async_trait]
pub trait Cache: Send + Sync {
    fn prefix(&self) -> &str;

    fn set_prefix(&mut self, prefix: String);

    /// Attach the prefix to a content key.
    fn pre(&self, key: &str) -> String {
        format!("{}{}", self.prefix(), key)
    }

    /// Strip the prefix from a backend key, if present.
    fn unpre<'a>(&self, key: &'a str) -> &'a str {
        key.strip_prefix(self.prefix()).unwrap_or(key)
    }

    async fn get(&self, key: &str) -> Result<Option<Record>>;

    async fn set(&self, key: &str, record: &Record) -> Result<()>;

    async fn contains_key(&self, key: &str) -> Result<bool>;

    /// Remove a record. Returns `true` when something was removed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// Number of records under the current prefix.
    async fn size(&self) -> Result<usize>;

    /// Remove every record under the current prefix.
    async fn clear(&self) -> Result<()>;

    /// Remove the records under the current prefix that share at least one
    /// of `tags`.
    async fn clear_tags(&self, tags: &[String]) -> Result<()> {
        for (key, record) in self.entries().await? {
            if shares_tag(&record, tags) {
                self.delete(self.unpre(&key)).await?;
            }
        }
        Ok(())
    }

    /// `(backend key, record)` pairs under the current prefix.
    async fn entries(&self) -> Result<Vec<(String, Record)>>;

    /// `(backend key, record)` pairs across every collection.
    async fn full_entries(&self) -> Result<Vec<(String, Record)>>;

    /// Distinct collection names among the keys shaped `<prefix><name>-<key>`,
    /// in first-seen order.
    async fn collections(&self, prefix: &str) -> Result<Vec<String>> {
        let mut names: Vec<String> = Vec::new();
        for (key, _) in self.full_entries().await? {
            let Some(rest) = key.strip_prefix(prefix) else {
                continue;
            };
            if let Some((name, _)) = rest.rsplit_once('-') {
                if !name.is_empty() && !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Union of the tags of every record under the prefix, each tag
    /// carrying the source of the record it was first seen on.
    async fn tags(&self) -> Result<Tags> {
        let mut tags = Tags::default();
        for (_, record) in self.entries().await? {
            tags.merge(&record.tags, record.source.as_deref());
        }
        Ok(tags)
    }

    /// Records under the prefix ranked by cosine similarity to `needle`,
    /// most similar first. With `tags`, only records sharing one of them
    /// are considered.
    async fn find_records(
        &self,
        needle: &[f32],
        tags: Option<&[String]>,
        max_records: Option<usize>,
    ) -> Result<Vec<RankedRecord>> {
        let entries = self.entries().await?;
        let candidates = entries
            .into_iter()
            .map(|(key, record)| (self.unpre(&key).to_string(), record));
        Ok(rank(needle, candidates, tags, max_records))
    }

    /// Hook for backends that store vectors in a native type.
    fn convert_to_vector(&self, vector: Vec<f32>) -> Vec<f32> {
        vector
    }
}

/// True when `record` carries at least one of `tags`.
pub fn shares_tag(record: &Record, tags: &[String]) -> bool {
    tags.iter().any(|t| record.tags.contains(t))
}

/// Brute-force ranking shared by the scan-based backends.
///
/// Filters by tag intersection (an absent or empty filter keeps
/// everything), scores each record against `needle` using the record's
/// stored norm, sorts ascending and reverses, then truncates to
/// `max_records`. Records scoring NaN (zero embeddings) come last.
pub fn rank<I>(
    needle: &[f32],
    candidates: I,
    tags: Option<&[String]>,
    max_records: Option<usize>,
) -> Vec<RankedRecord>
where
    I: IntoIterator<Item = (String, Record)>,
{
    let needle_norm = vector::norm(needle);
    let mut ranked: Vec<RankedRecord> = candidates
        .into_iter()
        .filter(|(_, record)| match tags {
            Some(tags) if !tags.is_empty() => shares_tag(record, tags),
            _ => true,
        })
        .map(|(key, record)| {
            let similarity = vector::cosine_similarity_with_norms(
                needle,
                &record.embedding,
                needle_norm,
                record.norm,
            );
            RankedRecord {
                key,
                record,
                similarity,
            }
        })
        .collect();

    ranked.sort_by(|a, b| vector::nan_lowest(a.similarity, b.similarity));
    ranked.reverse();
    if let Some(max) = max_records {
        ranked.truncate(max);
    }
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(text: &str, embedding: Vec<f32>, tags: &[&str]) -> (String, Record) {
        let record = Record::new(
            text,
            embedding,
            None,
            tags.iter().map(|t| t.to_string()).collect(),
        );
        (record.key(), record)
    }

    #[test]
    fn test_rank_descending() {
        let ranked = rank(
            &[1.0, 0.0],
            vec![
                rec("far", vec![0.0, 1.0], &[]),
                rec("near", vec![1.0, 0.0], &[]),
                rec("mid", vec![1.0, 1.0], &[]),
            ],
            None,
            None,
        );
        let texts: Vec<&str> = ranked.iter().map(|r| r.record.text.as_str()).collect();
        assert_eq!(texts, vec!["near", "mid", "far"]);
        assert!((ranked[0].similarity - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rank_tag_filter_and_limit() {
        let candidates = vec![
            rec("a", vec![1.0, 0.0], &["x"]),
            rec("b", vec![1.0, 0.1], &["y"]),
            rec("c", vec![1.0, 0.2], &["x", "y"]),
        ];
        let tags = vec!["x".to_string()];
        let ranked = rank(&[1.0, 0.0], candidates.clone(), Some(tags.as_slice()), None);
        let texts: Vec<&str> = ranked.iter().map(|r| r.record.text.as_str()).collect();
        assert_eq!(texts, vec!["a", "c"]);

        let limited = rank(&[1.0, 0.0], candidates, None, Some(1));
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].record.text, "a");
    }

    #[test]
    fn test_rank_zero_embeddings_sort_last() {
        let candidates: Vec<(String, Record)> = (0..40)
            .map(|i| {
                let embedding = if i % 7 == 0 {
                    vec![0.0, 0.0]
                } else {
                    vec![1.0, i as f32 / 10.0]
                };
                rec(&format!("r{i}"), embedding, &[])
            })
            .collect();
        let ranked = rank(&[1.0, 0.0], candidates, None, None);
        assert_eq!(ranked.len(), 40);

        let real: Vec<f32> = ranked
            .iter()
            .map(|r| r.similarity)
            .take_while(|s| !s.is_nan())
            .collect();
        assert_eq!(real.len(), 34);
        assert!(real.windows(2).all(|w| w[0] >= w[1]));
        assert!(ranked[34..].iter().all(|r| r.similarity.is_nan()));
        assert_eq!(ranked[0].record.text, "r1");
    }

    #[test]
    fn test_rank_empty_filter_keeps_all() {
        let ranked = rank(
            &[1.0],
            vec![rec("a", vec![1.0], &[]), rec("b", vec![2.0], &["t"])],
            Some(&[][..]),
            None,
        );
        assert_eq!(ranked.len(), 2);
    }
}
