//! # Docent
//!
//! Document-grounded conversational assistant core. Docent watches a local
//! directory of PDFs, turns them into an in-memory retrieval index, and
//! answers questions by grounding a chat model in the retrieved passages —
//! with an optional image attached to the current turn and a fallback model
//! behind the primary.
//!
//! ```text
//!   data/*.pdf
//!      │ scan
//!      ▼
//!   extract ──► chunk ──► index (real: embeddings / mock: order-preserving)
//!                            │
//!   query ───────────────────┤ retrieve (top-k)
//!                            ▼
//!   persona + history + image ──► prompt ──► invoke (primary → backup)
//! ```
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`scan`] | Discover `*.pdf` in the archive directory |
//! | [`extract`] | PDF text extraction with per-page fallback |
//! | [`chunk`] | Overlapping character windows over extracted text |
//! | [`ingest`] | Load + chunk the archive, fault-isolated per file |
//! | [`embedding`] | OpenAI-compatible embeddings client |
//! | [`index`] | In-memory index, real (cosine) or mock (first-k) |
//! | [`retrieve`] | Query the index; degrade every failure to empty |
//! | [`prompt`] | Assemble the chat-completion message list |
//! | [`invoke`] | Primary/backup completion with retry |
//! | [`engine`] | Orchestration, caching, error policy |
//!
//! Everything below the invoker degrades instead of erroring: a missing
//! archive, a corrupt PDF, or a failed embedding call each cost context,
//! never the answer. Only total model failure reaches the caller.

pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod extract;
pub mod index;
pub mod ingest;
pub mod invoke;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod scan;

pub use config::{load_config_or_default, Config};
pub use engine::{Engine, Outcome, QueryRequest};
