//! Core data models used throughout Docent.
//!
//! These types represent the documents, chunks, and retrieval results that
//! flow through the ingestion and answer pipeline.

use std::path::PathBuf;

/// A PDF discovered in the archive directory at scan time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Absolute (or scan-relative) path to the file.
    pub path: PathBuf,
    /// Display name: the basename only. Citations carry this, never the
    /// full path, so local filesystem structure does not leak into answers.
    pub name: String,
}

impl SourceDocument {
    pub fn new(path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self { path, name }
    }
}

/// The atomic retrievable unit: a bounded span of extracted document text.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    /// Basename of the originating PDF.
    pub source: String,
    /// 1-based page number when the extraction path knows it.
    pub page: Option<u32>,
    pub text: String,
}

impl Chunk {
    pub fn new(source: &str, page: Option<u32>, text: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.to_string(),
            page,
            text,
        }
    }
}

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One prior turn of the conversation. History is caller-owned; the core
/// only reads a bounded trailing window of it. Images attached to past
/// turns are not retained here — only the current turn's image enters the
/// pipeline, as raw bytes alongside the query.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Caller-side conversation record for multi-turn sessions.
///
/// The user turn is recorded the moment it is asked — before the answer is
/// requested — so a failed invocation still leaves a "user asked X" entry.
/// The assistant turn lands only when an answer actually arrives.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the user's query and return the history to send alongside it:
    /// everything before this turn. The query itself rides as the current
    /// message, not as history.
    pub fn begin_turn(&mut self, query: &str) -> Vec<ConversationTurn> {
        let prior = self.turns.clone();
        self.turns.push(ConversationTurn::user(query));
        prior
    }

    pub fn record_answer(&mut self, text: impl Into<String>) {
        self.turns.push(ConversationTurn::assistant(text));
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }
}

/// One retrieved chunk with its similarity score (0.0 in mock mode, where
/// no similarity is computed).
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ordered result of one retrieval, best match first. Discarded after
/// prompt assembly; never persisted.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
    /// Why retrieval degraded to empty, when it did. Diagnostic only.
    pub failure: Option<String>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            hits: Vec::new(),
            failure: Some(reason.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Distinct source names in hit order.
    pub fn sources(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for hit in &self.hits {
            if !seen.contains(&hit.chunk.source) {
                seen.push(hit.chunk.source.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_document_name_is_basename() {
        let doc = SourceDocument::new(PathBuf::from("/srv/archive/GuidelineA.pdf"));
        assert_eq!(doc.name, "GuidelineA.pdf");
    }

    #[test]
    fn chat_session_records_the_question_before_any_answer() {
        let mut session = ChatSession::new();

        let prior = session.begin_turn("first question");
        assert!(prior.is_empty());
        // No answer arrived, but the question is already on record.
        assert_eq!(session.turns().len(), 1);
        assert_eq!(session.turns()[0].role, Role::User);
        assert_eq!(session.turns()[0].text, "first question");

        // The next turn's history carries the unanswered question; the new
        // query itself stays out of it.
        let prior = session.begin_turn("second question");
        assert_eq!(prior.len(), 1);
        assert_eq!(prior[0].text, "first question");

        session.record_answer("an answer");
        assert_eq!(session.turns().len(), 3);
        assert_eq!(session.turns()[2].role, Role::Assistant);
    }

    #[test]
    fn sources_deduplicate_in_hit_order() {
        let result = RetrievalResult {
            hits: vec![
                RetrievedChunk {
                    chunk: Chunk::new("b.pdf", None, "x".into()),
                    score: 0.9,
                },
                RetrievedChunk {
                    chunk: Chunk::new("a.pdf", None, "y".into()),
                    score: 0.8,
                },
                RetrievedChunk {
                    chunk: Chunk::new("b.pdf", None, "z".into()),
                    score: 0.7,
                },
            ],
            failure: None,
        };
        assert_eq!(result.sources(), vec!["b.pdf", "a.pdf"]);
    }
}
