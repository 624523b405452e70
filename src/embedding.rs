//! Ollama embedding client.
//!
//! [`OllamaEmbedder`] posts batches to Ollama's `/api/embed` endpoint and
//! returns one vector per input, in order.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//!
//! Backoff doubles from one second, capped at 32 seconds, for up to
//! `max_retries` retries.

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{debug, warn};

use vecdocs_core::Embedder;

use crate::config::EmbeddingConfig;

#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(
        &self,
        model: &str,
        input: &[String],
        options: Option<&serde_json::Value>,
    ) -> Result<Vec<Vec<f32>>> {
        let body = request_body(model, input, options);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let embeddings = parse_embed_response(&json)?;
                        debug!(model, count = embeddings.len(), "embedded batch");
                        return Ok(embeddings);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "ollama request failed, retrying");
                        last_err = Some(anyhow::anyhow!(
                            "Ollama API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "ollama connection failed, retrying");
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama embedding failed after retries")))
    }
}

/// `{"model", "input", "options"?}`; `options` is left out when unset.
fn request_body(
    model: &str,
    input: &[String],
    options: Option<&serde_json::Value>,
) -> serde_json::Value {
    let mut body = serde_json::json!({
        "model": model,
        "input": input,
    });
    if let Some(options) = options {
        body["options"] = options.clone();
    }
    body
}

fn parse_embed_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            let values = embedding.as_array().ok_or_else(|| {
                anyhow::anyhow!("Invalid Ollama response: embedding is not an array")
            })?;
            values
                .iter()
                .map(|v| {
                    v.as_f64().map(|f| f as f32).ok_or_else(|| {
                        anyhow::anyhow!("Invalid Ollama response: non-numeric component")
                    })
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_without_options() {
        let body = request_body("mxbai-embed-large", &["hello".to_string()], None);
        assert_eq!(body, json!({ "model": "mxbai-embed-large", "input": ["hello"] }));
    }

    #[test]
    fn test_request_body_with_options() {
        let options = json!({ "num_ctx": 8192 });
        let body = request_body("m", &["a".to_string(), "b".to_string()], Some(&options));
        assert_eq!(body["options"]["num_ctx"], 8192);
        assert_eq!(body["input"], json!(["a", "b"]));
    }

    #[test]
    fn test_parse_embed_response() {
        let parsed = parse_embed_response(&json!({
            "model": "m",
            "embeddings": [[0.5, 1.0], [-1.0, 0.25]]
        }))
        .unwrap();
        assert_eq!(parsed, vec![vec![0.5, 1.0], vec![-1.0, 0.25]]);
    }

    #[test]
    fn test_parse_embed_response_missing_embeddings() {
        let err = parse_embed_response(&json!({ "error": "model not found" })).unwrap_err();
        assert!(err.to_string().contains("missing embeddings"));
    }

    #[test]
    fn test_parse_embed_response_rejects_non_numeric() {
        assert!(parse_embed_response(&json!({ "embeddings": [["x"]] })).is_err());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = EmbeddingConfig {
            url: "http://ollama:11434/".to_string(),
            ..EmbeddingConfig::default()
        };
        let embedder = OllamaEmbedder::new(&config).unwrap();
        assert_eq!(embedder.url(), "http://ollama:11434");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_after_retries() {
        let config = EmbeddingConfig {
            url: "http://127.0.0.1:1".to_string(),
            timeout_secs: 1,
            max_retries: 0,
        };
        let embedder = OllamaEmbedder::new(&config).unwrap();
        let err = embedder
            .embed("m", &["hello".to_string()], None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Ollama connection error"));
    }
}
