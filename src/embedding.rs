//! Embedding client for OpenAI-compatible endpoints.
//!
//! Provider selection mirrors the config switch:
//! - **`"mock"`** — performs no network calls; asking it to embed is an
//!   error. Mock-mode indexing and retrieval never reach this module.
//! - **`"openai"`** — calls `POST {base_url}/embeddings` with batching,
//!   retry, and backoff. The base URL is configurable so any
//!   OpenAI-compatible service (OpenRouter, a local proxy) works.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EmbeddingConfig;

/// Environment variable holding the API key for both the embedding and the
/// completion endpoints. Never read from the config file.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Embed a batch of texts, in order. Splits the input into `batch_size`
/// requests and concatenates the results.
///
/// # Errors
///
/// - `"mock"` provider: always an error — callers in mock mode must not
///   embed.
/// - `"openai"` provider: missing API key, a non-retryable API error,
///   exhausted retries, or a response whose vectors do not match
///   `config.dims`.
pub async fn embed_texts(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    match config.provider.as_str() {
        "openai" => {
            let mut all = Vec::with_capacity(texts.len());
            for batch in texts.chunks(config.batch_size.max(1)) {
                all.extend(embed_openai(config, batch).await?);
            }
            Ok(all)
        }
        "mock" => bail!("mock embedding provider performs no embedding calls"),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Embed a single query text. Convenience wrapper for retrieval.
pub async fn embed_query(config: &EmbeddingConfig, text: &str) -> Result<Vec<f32>> {
    let results = embed_texts(config, &[text.to_string()]).await?;
    results
        .into_iter()
        .next()
        .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))
}

/// Call the embeddings endpoint with retry/backoff and validate the result
/// against the configured dimensionality.
async fn embed_openai(config: &EmbeddingConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_key =
        std::env::var(API_KEY_ENV).map_err(|_| anyhow::anyhow!("{} not set", API_KEY_ENV))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;

    let url = format!("{}/embeddings", config.base_url.trim_end_matches('/'));
    let body = serde_json::json!({
        "model": config.model,
        "input": texts,
    });

    let mut last_err = None;

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            // Exponential backoff: 1s, 2s, 4s, 8s, ...
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tokio::time::sleep(delay).await;
        }

        let resp = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await;

        match resp {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    let json: serde_json::Value = response.json().await?;
                    let vectors = parse_embedding_response(&json)?;
                    validate_dims(config, &vectors, texts.len())?;
                    return Ok(vectors);
                }

                // Rate limited or server error — retry
                if status.as_u16() == 429 || status.is_server_error() {
                    let body_text = response.text().await.unwrap_or_default();
                    last_err = Some(anyhow::anyhow!(
                        "Embedding API error {}: {}",
                        status,
                        body_text
                    ));
                    continue;
                }

                // Client error (not 429) — don't retry
                let body_text = response.text().await.unwrap_or_default();
                bail!("Embedding API error {}: {}", status, body_text);
            }
            Err(e) => {
                last_err = Some(e.into());
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
}

/// Extract the `data[].embedding` arrays, in response order.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());

    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid embedding response: missing embedding"))?;

        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        embeddings.push(vec);
    }

    Ok(embeddings)
}

/// Reject malformed responses: wrong count or wrong dimensionality. A bad
/// vector here would poison every later similarity comparison.
fn validate_dims(config: &EmbeddingConfig, vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        bail!(
            "Embedding count mismatch: sent {} texts, got {} vectors",
            expected,
            vectors.len()
        );
    }
    for v in vectors {
        if v.len() != config.dims {
            bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                config.dims,
                v.len()
            );
        }
    }
    Ok(())
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors of
/// different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_refuses_to_embed() {
        let config = EmbeddingConfig::default();
        assert!(config.is_mock());
        assert!(embed_texts(&config, &["hello".to_string()]).await.is_err());
    }

    #[test]
    fn parse_valid_response() {
        let json = serde_json::json!({
            "data": [
                { "embedding": [0.1, 0.2, 0.3] },
                { "embedding": [0.4, 0.5, 0.6] },
            ]
        });
        let vectors = parse_embedding_response(&json).unwrap();
        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0].len(), 3);
    }

    #[test]
    fn parse_rejects_missing_data() {
        assert!(parse_embedding_response(&serde_json::json!({})).is_err());
    }

    #[test]
    fn dims_validation_rejects_short_vectors() {
        let mut config = EmbeddingConfig::default();
        config.dims = 3;
        assert!(validate_dims(&config, &[vec![0.0; 3]], 1).is_ok());
        assert!(validate_dims(&config, &[vec![0.0; 2]], 1).is_err());
        assert!(validate_dims(&config, &[vec![0.0; 3]], 2).is_err());
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
