//! Retriever: query the index, degrade every failure to empty context.
//!
//! Retrieval sits below the invoker in the error-propagation policy: a
//! failed lookup must never abort answer generation, so this module
//! converts every failure into an empty [`RetrievalResult`] carrying the
//! reason for diagnostic display.

use tracing::warn;

use crate::config::EmbeddingConfig;
use crate::index::ArchiveIndex;
use crate::models::RetrievalResult;

/// Excerpt length used in the diagnostic trace.
const TRACE_EXCERPT_CHARS: usize = 160;

/// Retrieve up to `k` chunks for `query`.
///
/// A `None` index (no documents, or a failed build) and `k == 0` both
/// yield an empty result — not an error. A lookup failure in real mode
/// (e.g. the query embedding call fails) is caught here, logged, and
/// recorded in `failure`; the caller proceeds without archive context.
pub async fn retrieve(
    index: Option<&ArchiveIndex>,
    config: &EmbeddingConfig,
    query: &str,
    k: usize,
) -> RetrievalResult {
    let index = match index {
        Some(index) => index,
        None => return RetrievalResult::empty(),
    };
    if k == 0 {
        return RetrievalResult::empty();
    }

    match index.search(config, query, k).await {
        Ok(hits) => RetrievalResult {
            hits,
            failure: None,
        },
        Err(e) => {
            warn!(error = %e, "retrieval failed; answering without archive context");
            RetrievalResult::failed(format!("{:#}", e))
        }
    }
}

/// Render the retrieved sources as a human-readable trace for the
/// presentation layer. Derived purely from the result; no other state.
pub fn render_trace(result: &RetrievalResult) -> String {
    if let Some(reason) = &result.failure {
        return format!("Retrieval unavailable: {}", reason);
    }
    if result.hits.is_empty() {
        return "No archive context retrieved.".to_string();
    }

    let mut out = String::new();
    for (i, hit) in result.hits.iter().enumerate() {
        let excerpt: String = hit
            .chunk
            .text
            .chars()
            .take(TRACE_EXCERPT_CHARS)
            .map(|c| if c == '\n' { ' ' } else { c })
            .collect();
        let page = hit
            .chunk
            .page
            .map(|p| format!(" p.{}", p))
            .unwrap_or_default();
        out.push_str(&format!(
            "{}. [{:.2}] {}{} — \"{}\"\n",
            i + 1,
            hit.score,
            hit.chunk.source,
            page,
            excerpt.trim()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chunk, RetrievedChunk};

    #[tokio::test]
    async fn null_index_yields_empty_result() {
        let result = retrieve(None, &EmbeddingConfig::default(), "q", 4).await;
        assert!(result.is_empty());
        assert!(result.failure.is_none());
    }

    #[tokio::test]
    async fn zero_k_yields_empty_result() {
        let index = ArchiveIndex::Mock {
            chunks: vec![Chunk::new("a.pdf", None, "text".into())],
        };
        let result = retrieve(Some(&index), &EmbeddingConfig::default(), "q", 0).await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn real_index_with_mock_config_degrades_not_errors() {
        // A Real index whose search path cannot embed (mock provider refuses)
        // must come back empty with the reason recorded.
        let index = ArchiveIndex::Real {
            chunks: vec![Chunk::new("a.pdf", None, "text".into())],
            vectors: vec![vec![1.0, 0.0]],
        };
        let result = retrieve(Some(&index), &EmbeddingConfig::default(), "q", 3).await;
        assert!(result.is_empty());
        assert!(result.failure.is_some());
    }

    #[test]
    fn trace_lists_sources_and_excerpts() {
        let result = RetrievalResult {
            hits: vec![RetrievedChunk {
                chunk: Chunk::new(
                    "GuidelineA.pdf",
                    Some(1),
                    "Take medication twice daily.\nWith food.".into(),
                ),
                score: 0.83,
            }],
            failure: None,
        };
        let trace = render_trace(&result);
        assert!(trace.contains("GuidelineA.pdf"));
        assert!(trace.contains("p.1"));
        assert!(trace.contains("Take medication twice daily."));
        assert!(!trace.contains('\n') || trace.lines().count() == 1);
    }

    #[test]
    fn trace_reports_empty_and_failed_states() {
        assert!(render_trace(&RetrievalResult::empty()).contains("No archive context"));
        assert!(render_trace(&RetrievalResult::failed("boom")).contains("boom"));
    }
}
