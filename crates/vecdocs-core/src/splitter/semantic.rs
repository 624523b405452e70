//! Embedding-driven splitter.
//!
//! # Algorithm
//!
//! 1. Split the text into sentences (a [`Character`] split that keeps the
//!    punctuation, one sentence per chunk).
//! 2. Embed the sentences, `batch_size` per embedder call.
//! 3. Compute the cosine distance `1 - cos(e[i], e[i + 1])` between each
//!    pair of consecutive sentences.
//! 4. Derive a threshold from the distances with a [`Breakpoint`] policy.
//! 5. Cut after every sentence whose distance to the next one exceeds the
//!    threshold, and after the last sentence.
//! 6. Pack the sentences between cuts into chunks below `chunk_size`
//!    characters, never crossing a cut.

use std::sync::Arc;

use anyhow::{bail, Result};
use regex::Regex;
use tracing::debug;

use crate::embedding::Embedder;
use crate::error::StoreError;
use crate::vector;

use super::{combine, compile, Character};

const DEFAULT_CHUNK_SIZE: usize = 4096;

/// How the distance threshold is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Breakpoint {
    /// The given percentile of the distances, in `[0, 100)`.
    Percentile(f64),
    /// `mean + sd * percentage / 100`, clamped to `[0, max]`.
    StandardDeviation(f64),
    /// `mean + iqr * percentage / 100`, clamped to `[0, max]`.
    Interquartile(f64),
}

impl Default for Breakpoint {
    fn default() -> Self {
        Self::Percentile(95.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SemanticOptions {
    pub batch_size: usize,
    pub breakpoint: Breakpoint,
}

impl Default for SemanticOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            breakpoint: Breakpoint::default(),
        }
    }
}

/// Splits text where consecutive sentences stop being about the same thing.
pub struct Semantic {
    embedder: Arc<dyn Embedder>,
    model: String,
    model_options: Option<serde_json::Value>,
    separator: Regex,
    chunk_size: usize,
}

impl Semantic {
    /// Sentence-ending punctuation plus trailing whitespace.
    pub const DEFAULT_SEPARATOR: &'static str = r"[.!?]\s*(?:\b|\z)";

    pub fn new(embedder: Arc<dyn Embedder>, model: impl Into<String>) -> Result<Self> {
        Ok(Self {
            embedder,
            model: model.into(),
            model_options: None,
            separator: compile(Self::DEFAULT_SEPARATOR)?,
            chunk_size: DEFAULT_CHUNK_SIZE,
        })
    }

    pub fn with_model_options(mut self, options: serde_json::Value) -> Self {
        self.model_options = Some(options);
        self
    }

    pub fn with_separator(mut self, pattern: &str) -> Result<Self> {
        self.separator = compile(pattern)?;
        Ok(self)
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub async fn split(&self, text: &str, options: SemanticOptions) -> Result<Vec<String>> {
        let sentences = Character::from_regex(self.separator.clone())
            .include_separator(true)
            .chunk_size(1)
            .split(text);
        if sentences.len() < 2 {
            return Ok(sentences);
        }

        let embeddings = self.embed_sentences(&sentences, options.batch_size).await?;
        let distances: Vec<f64> = embeddings
            .windows(2)
            .map(|pair| 1.0 - vector::cosine_similarity(&pair[0], &pair[1]) as f64)
            .collect();

        let threshold = breakpoint_threshold(options.breakpoint, &distances)?;
        let mut gaps: Vec<usize> = distances
            .iter()
            .enumerate()
            .filter(|(_, d)| **d > threshold)
            .map(|(i, _)| i)
            .collect();
        debug!(
            sentences = sentences.len(),
            threshold,
            cuts = gaps.len(),
            "semantic split"
        );
        let last = sentences.len() - 1;
        match gaps.last().copied() {
            None => return Ok(sentences),
            Some(g) if g < last => gaps.push(last),
            Some(_) => {}
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        for gap in gaps {
            chunks.extend(combine(
                sentences[start..=gap].iter().cloned(),
                "",
                self.chunk_size,
            ));
            start = gap + 1;
        }
        Ok(chunks)
    }

    async fn embed_sentences(&self, sentences: &[String], batch_size: usize) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(sentences.len());
        for batch in sentences.chunks(batch_size.max(1)) {
            let vectors = self
                .embedder
                .embed(&self.model, batch, self.model_options.as_ref())
                .await?;
            if vectors.len() != batch.len() {
                return Err(StoreError::EmbeddingCount {
                    expected: batch.len(),
                    actual: vectors.len(),
                }
                .into());
            }
            embeddings.extend(vectors);
        }
        Ok(embeddings)
    }
}

/// Threshold over the real distances. NaN distances (zero embeddings) take
/// no part in the statistics and never exceed the threshold, so they never
/// cause a cut.
fn breakpoint_threshold(breakpoint: Breakpoint, distances: &[f64]) -> Result<f64> {
    let mut sorted: Vec<f64> = distances.iter().copied().filter(|d| !d.is_nan()).collect();
    if sorted.is_empty() {
        return Ok(f64::INFINITY);
    }
    sorted.sort_by(f64::total_cmp);
    let max = sorted.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = match breakpoint {
        Breakpoint::Percentile(p) => percentile(&sorted, p)?,
        Breakpoint::StandardDeviation(percentage) => {
            let limit = mean(&sorted) + standard_deviation(&sorted) * (percentage / 100.0);
            limit.max(0.0).min(max)
        }
        Breakpoint::Interquartile(percentage) => {
            let iqr = percentile(&sorted, 75.0)? - percentile(&sorted, 25.0)?;
            let limit = mean(&sorted) + iqr * (percentage / 100.0);
            limit.max(0.0).min(max)
        }
    };
    Ok(threshold)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn standard_deviation(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Percentile of an ascending slice, using the `p * (n + 1)` rank with
/// linear interpolation between neighbors.
fn percentile(sorted: &[f64], p: f64) -> Result<f64> {
    if !(0.0..100.0).contains(&p) {
        bail!(StoreError::Configuration(format!(
            "percentile {p} outside of [0, 100)"
        )));
    }
    let Some(&first) = sorted.first() else {
        bail!("percentile of an empty sequence");
    };
    let rank = p / 100.0 * (sorted.len() + 1) as f64;
    let rank_i = rank.floor() as usize;
    let rank_f = rank - rank_i as f64;
    if rank_i == 0 {
        return Ok(first);
    }
    let mut result = sorted[rank_i - 1];
    if rank_i < sorted.len() {
        result += rank_f * (sorted[rank_i] - sorted[rank_i - 1]);
    }
    Ok(result)
}
