//! Engine: the orchestrating core behind every query.
//!
//! Owns the configuration, the completion backend, and two content-addressed
//! caches:
//! - the **ingestion memo**, keyed by [`ingest::archive_fingerprint`] —
//!   repeated queries over an unchanged archive never re-parse PDFs;
//! - the **index cache**, keyed by [`index::chunk_fingerprint`] — the index
//!   is built once per distinct chunk set, and concurrent cold-start
//!   queries serialize on one build instead of racing.
//!
//! Error policy: everything below the invoker degrades. A missing archive,
//! an unreadable file, a failed index build, a failed retrieval — each is
//! absorbed with a warning and the query proceeds with less context. Only
//! total invocation failure surfaces to the caller.

use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::index::{self, ArchiveIndex};
use crate::ingest::{self, IngestOutcome};
use crate::invoke::{self, CompletionBackend, HttpBackend};
use crate::models::{ConversationTurn, RetrievalResult};
use crate::prompt;
use crate::retrieve;
use crate::scan;

/// One query into the engine. History is caller-owned; only the current
/// turn's image is ever sent.
#[derive(Debug, Default)]
pub struct QueryRequest {
    pub query: String,
    /// Persona name resolved against `[personas]`; `None` means default.
    pub persona: Option<String>,
    pub history: Vec<ConversationTurn>,
    pub image: Option<Vec<u8>>,
}

impl QueryRequest {
    pub fn text(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }
}

/// Everything the presentation layer needs from one answered query.
#[derive(Debug)]
pub struct Outcome {
    pub answer: String,
    /// Model that actually produced the answer.
    pub model: String,
    pub via_backup: bool,
    /// Distinct source names behind the retrieved context, hit order.
    pub sources: Vec<String>,
    /// Human-readable retrieval trace for `--show-sources`.
    pub trace: String,
}

/// Summary of one ingestion pass, for the `ingest` command.
#[derive(Debug)]
pub struct IngestReport {
    pub documents: usize,
    pub documents_loaded: usize,
    pub chunks: usize,
    pub warnings: Vec<String>,
    /// False when the archive was empty or the index build failed.
    pub indexed: bool,
}

#[derive(Default)]
struct CacheState {
    /// (archive fingerprint, loaded chunks + warnings)
    ingest: Option<(String, Arc<IngestOutcome>)>,
    /// (chunk fingerprint, built index — `None` is the cached null index)
    index: Option<(String, Option<Arc<ArchiveIndex>>)>,
}

pub struct Engine {
    config: Config,
    backend: Box<dyn CompletionBackend>,
    state: Mutex<CacheState>,
    /// Cache-miss counters over this engine's lifetime, for diagnostics.
    ingest_passes: AtomicU64,
    index_builds: AtomicU64,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        let backend = HttpBackend::new(&config.model)?;
        Ok(Self::with_backend(config, Box::new(backend)))
    }

    /// Construct with a caller-supplied backend. Used by tests to answer
    /// without a network.
    pub fn with_backend(config: Config, backend: Box<dyn CompletionBackend>) -> Self {
        Self {
            config,
            backend,
            state: Mutex::new(CacheState::default()),
            ingest_passes: AtomicU64::new(0),
            index_builds: AtomicU64::new(0),
        }
    }

    /// Ingestion passes performed so far (archive-fingerprint cache misses).
    pub fn ingest_passes(&self) -> u64 {
        self.ingest_passes.load(Ordering::Relaxed)
    }

    /// Index builds attempted so far (chunk-fingerprint cache misses).
    pub fn index_builds(&self) -> u64 {
        self.index_builds.load(Ordering::Relaxed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Scan, load, and index the archive, reusing both caches where the
    /// fingerprints still match. Holding the state lock across the whole
    /// pass is what guarantees a single build under concurrent cold start.
    async fn current_index(&self) -> (Option<Arc<ArchiveIndex>>, Arc<IngestOutcome>, usize) {
        let mut state = self.state.lock().await;

        let docs = scan::scan_archive(&self.config.archive.dir);
        let archive_key = ingest::archive_fingerprint(&docs);

        let outcome = match &state.ingest {
            Some((key, cached)) if *key == archive_key => Arc::clone(cached),
            _ => {
                self.ingest_passes.fetch_add(1, Ordering::Relaxed);
                let loaded = Arc::new(ingest::load_archive(&docs, &self.config.chunking));
                info!(
                    documents = docs.len(),
                    chunks = loaded.chunks.len(),
                    "archive loaded"
                );
                state.ingest = Some((archive_key, Arc::clone(&loaded)));
                loaded
            }
        };

        let chunk_key = index::chunk_fingerprint(&outcome.chunks);
        let built = match &state.index {
            Some((key, cached)) if *key == chunk_key => cached.clone(),
            _ => {
                self.index_builds.fetch_add(1, Ordering::Relaxed);
                let built = match ArchiveIndex::build(outcome.chunks.clone(), &self.config.embedding)
                    .await
                {
                    Ok(built) => built.map(Arc::new),
                    Err(e) => {
                        warn!(error = %format!("{:#}", e), "index build failed; continuing without archive context");
                        None
                    }
                };
                state.index = Some((chunk_key, built.clone()));
                built
            }
        };

        (built, outcome, docs.len())
    }

    /// Drop both caches so the next query re-ingests and re-indexes.
    pub async fn rebuild(&self) {
        let mut state = self.state.lock().await;
        state.ingest = None;
        state.index = None;
    }

    /// Run one ingestion pass and report what happened. `force` drops the
    /// caches first.
    pub async fn ingest(&self, force: bool) -> IngestReport {
        if force {
            self.rebuild().await;
        }

        // Single scan, inside the locked pass: the report always describes
        // the documents that were actually ingested.
        let (built, outcome, documents) = self.current_index().await;

        IngestReport {
            documents,
            documents_loaded: outcome.documents_loaded(),
            chunks: outcome.chunks.len(),
            warnings: outcome.warnings.clone(),
            indexed: built.is_some(),
        }
    }

    /// Answer one query end to end.
    ///
    /// # Errors
    ///
    /// Only when every candidate model has failed every attempt. Every
    /// other fault degrades internally.
    pub async fn answer(&self, request: QueryRequest) -> Result<Outcome> {
        let (index, _, _) = self.current_index().await;

        let retrieval: RetrievalResult = retrieve::retrieve(
            index.as_deref(),
            &self.config.embedding,
            &request.query,
            self.config.retrieval.top_k,
        )
        .await;

        let persona = self
            .config
            .persona(request.persona.as_deref().unwrap_or_default());

        let messages = prompt::assemble(
            &persona,
            &retrieval,
            &request.history,
            self.config.history.window,
            &request.query,
            request.image.as_deref(),
        );

        let answer = invoke::invoke(self.backend.as_ref(), &self.config.model, &messages).await?;

        Ok(Outcome {
            answer: answer.text,
            model: answer.model,
            via_backup: answer.via_backup,
            sources: retrieval.sources(),
            trace: retrieve::render_trace(&retrieval),
        })
    }
}
