//! Context and prompt assembly.
//!
//! Pure data transformation: persona instructions, retrieved chunks,
//! a bounded history suffix, the current query, and an optional image are
//! folded into the chat-completion message list. No I/O happens here.
//!
//! Retrieved chunks render as `[Source: <file>]`-labelled blocks appended
//! to the system message, so the model can cite its sources verbatim when
//! the persona tells it to. Citation is a behavioral expectation carried by
//! instruction text, not something the code verifies.

use base64::Engine as _;
use serde::Serialize;

use crate::models::{ConversationTurn, RetrievalResult};

/// Header introducing the archive section of the system message.
const CONTEXT_HEADER: &str = "USE THESE INTERNAL GUIDELINES:";

/// One role-tagged message on the chat-completion wire.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.to_string(),
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Message content: a plain string, or a list of typed parts for
/// text-plus-image turns.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Flattened text view, used by tests and the diagnostic surface.
    pub fn as_text(&self) -> String {
        match self {
            MessageContent::Text(s) => s.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Assemble the full message list for one query.
///
/// - The system message is the persona, plus the labelled archive blocks
///   when retrieval produced any. Zero hits means persona only — no empty
///   header, no fabricated citation.
/// - Only the trailing `window` turns of history are included, text-only:
///   images from past turns are never re-sent.
/// - The current image (if any) rides alongside the query as a base64
///   `data:` URI in one multi-part user message.
pub fn assemble(
    persona: &str,
    retrieval: &RetrievalResult,
    history: &[ConversationTurn],
    window: usize,
    query: &str,
    image: Option<&[u8]>,
) -> Vec<ChatMessage> {
    let mut system = persona.to_string();
    if !retrieval.is_empty() {
        system.push_str("\n\n");
        system.push_str(CONTEXT_HEADER);
        system.push('\n');
        system.push_str(&render_context(retrieval));
    }

    let mut messages = vec![ChatMessage::text("system", system)];

    let tail_start = history.len().saturating_sub(window);
    for turn in &history[tail_start..] {
        messages.push(ChatMessage::text(turn.role.as_str(), turn.text.clone()));
    }

    messages.push(user_message(query, image));
    messages
}

/// Render retrieved chunks as source-labelled blocks, blank-line separated.
fn render_context(retrieval: &RetrievalResult) -> String {
    retrieval
        .hits
        .iter()
        .map(|hit| format!("[Source: {}] {}", hit.chunk.source, hit.chunk.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn user_message(query: &str, image: Option<&[u8]>) -> ChatMessage {
    match image {
        None => ChatMessage::text("user", query),
        Some(bytes) => ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: query.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: encode_image_data_uri(bytes),
                    },
                },
            ]),
        },
    }
}

/// Raw image bytes as a `data:` URI. The MIME label is always JPEG — the
/// backends decode the payload itself, not the label.
pub fn encode_image_data_uri(bytes: &[u8]) -> String {
    format!(
        "data:image/jpeg;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}
