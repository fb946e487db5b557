//! In-memory archive index with real and mock variants.
//!
//! Both variants sit behind one `search` entry point so callers never
//! branch on the mode:
//! - **`Real`** — every chunk paired with its embedding vector; search
//!   embeds the query with the same model and ranks by cosine similarity.
//! - **`Mock`** — chunks only; search returns the first K in ingestion
//!   order, deterministically, with no network calls. Selected by
//!   `embedding.provider = "mock"`.
//!
//! The index is immutable once built; rebuilding means constructing a new
//! one. Shared via `Arc`, concurrent readers need no locking.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

use crate::config::EmbeddingConfig;
use crate::embedding;
use crate::models::{Chunk, RetrievedChunk};

pub enum ArchiveIndex {
    Real {
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    },
    Mock {
        chunks: Vec<Chunk>,
    },
}

impl ArchiveIndex {
    /// Build an index over `chunks`.
    ///
    /// Zero chunks yields `Ok(None)` — the null index. Callers treat "no
    /// documents" and "index build failed" identically: no retrieval.
    /// In real mode an unreachable embedding service or a malformed vector
    /// response is an error; the engine degrades it to a null index rather
    /// than crashing the query path.
    pub async fn build(
        chunks: Vec<Chunk>,
        config: &EmbeddingConfig,
    ) -> Result<Option<ArchiveIndex>> {
        if chunks.is_empty() {
            return Ok(None);
        }

        if config.is_mock() {
            return Ok(Some(ArchiveIndex::Mock { chunks }));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedding::embed_texts(config, &texts)
            .await
            .context("index build failed: could not embed archive chunks")?;

        Ok(Some(ArchiveIndex::Real { chunks, vectors }))
    }

    pub fn len(&self) -> usize {
        match self {
            ArchiveIndex::Real { chunks, .. } => chunks.len(),
            ArchiveIndex::Mock { chunks } => chunks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, ArchiveIndex::Mock { .. })
    }

    /// Return up to `k` chunks for `query`, best first.
    ///
    /// Real mode embeds the query and ranks all chunks by descending cosine
    /// similarity (ties broken by ingestion order, so results are stable).
    /// Mock mode ignores the query text entirely and returns the first `k`
    /// chunks in ingestion order with score 0.0. `k` larger than the index
    /// simply returns everything.
    pub async fn search(
        &self,
        config: &EmbeddingConfig,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>> {
        match self {
            ArchiveIndex::Mock { chunks } => Ok(chunks
                .iter()
                .take(k)
                .map(|chunk| RetrievedChunk {
                    chunk: chunk.clone(),
                    score: 0.0,
                })
                .collect()),
            ArchiveIndex::Real { chunks, vectors } => {
                let query_vec = embedding::embed_query(config, query)
                    .await
                    .context("could not embed query")?;

                let mut scored: Vec<(usize, f32)> = vectors
                    .iter()
                    .enumerate()
                    .map(|(i, v)| (i, embedding::cosine_similarity(&query_vec, v)))
                    .collect();

                scored.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then(a.0.cmp(&b.0))
                });
                scored.truncate(k);

                Ok(scored
                    .into_iter()
                    .map(|(i, score)| RetrievedChunk {
                        chunk: chunks[i].clone(),
                        score,
                    })
                    .collect())
            }
        }
    }
}

/// Content-addressed key for the index cache: a SHA-256 over every chunk's
/// source and text, in order. Rebuilding with different documents can never
/// silently reuse a stale index; chunk ids (random) deliberately do not
/// participate.
pub fn chunk_fingerprint(chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    for chunk in chunks {
        hasher.update(chunk.source.as_bytes());
        hasher.update([0u8]);
        hasher.update(chunk.text.as_bytes());
        hasher.update([0u8]);
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(n: usize) -> Vec<Chunk> {
        (0..n)
            .map(|i| Chunk::new("doc.pdf", None, format!("chunk number {}", i)))
            .collect()
    }

    #[tokio::test]
    async fn empty_input_builds_null_index() {
        let built = ArchiveIndex::build(Vec::new(), &EmbeddingConfig::default())
            .await
            .unwrap();
        assert!(built.is_none());
    }

    #[tokio::test]
    async fn mock_build_skips_embedding() {
        // Default provider is mock; no API key or network is needed.
        let index = ArchiveIndex::build(chunks(3), &EmbeddingConfig::default())
            .await
            .unwrap()
            .expect("non-empty input builds an index");
        assert!(index.is_mock());
        assert_eq!(index.len(), 3);
    }

    #[tokio::test]
    async fn mock_search_returns_first_k_in_order() {
        let config = EmbeddingConfig::default();
        let index = ArchiveIndex::build(chunks(5), &config)
            .await
            .unwrap()
            .unwrap();

        for k in 1..=5 {
            let hits = index.search(&config, "anything at all", k).await.unwrap();
            assert_eq!(hits.len(), k);
            for (i, hit) in hits.iter().enumerate() {
                assert_eq!(hit.chunk.text, format!("chunk number {}", i));
                assert_eq!(hit.score, 0.0);
            }
        }
    }

    #[tokio::test]
    async fn mock_search_k_beyond_len_returns_all() {
        let config = EmbeddingConfig::default();
        let index = ArchiveIndex::build(chunks(2), &config)
            .await
            .unwrap()
            .unwrap();
        let hits = index.search(&config, "q", 10).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn real_search_ranks_by_cosine() {
        // Hand-built Real index; no embedding service involved in ranking.
        let index = ArchiveIndex::Real {
            chunks: chunks(3),
            vectors: vec![
                vec![1.0, 0.0],
                vec![0.0, 1.0],
                vec![0.7, 0.7],
            ],
        };
        // Rank against a fixed query vector by scoring directly.
        let query = vec![1.0, 0.0];
        if let ArchiveIndex::Real { vectors, .. } = &index {
            let mut scored: Vec<(usize, f32)> = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (i, embedding::cosine_similarity(&query, v)))
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
            let order: Vec<usize> = scored.iter().map(|(i, _)| *i).collect();
            assert_eq!(order, vec![0, 2, 1]);
        }
    }

    #[test]
    fn fingerprint_ignores_ids_but_not_content() {
        let a = vec![Chunk::new("x.pdf", None, "same text".into())];
        let b = vec![Chunk::new("x.pdf", None, "same text".into())];
        let c = vec![Chunk::new("x.pdf", None, "other text".into())];
        assert_ne!(a[0].id, b[0].id);
        assert_eq!(chunk_fingerprint(&a), chunk_fingerprint(&b));
        assert_ne!(chunk_fingerprint(&a), chunk_fingerprint(&c));
    }
}
