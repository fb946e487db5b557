use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The default persona sent when the caller does not name one. Carries the
/// citation rule as instruction text; nothing in the core verifies that the
/// model actually obeys it.
pub const DEFAULT_PERSONA: &str = "You are an expert assistant answering from a private \
document archive. CRITICAL RULES:\n\
1. If internal archive context is provided, you MUST explicitly reference it in your \
answer (e.g. 'According to the guideline...').\n\
2. If an image is provided, analyze its implications with high precision.\n\
3. Be direct and avoid generic disclaimers unless strictly necessary.\n\
4. Always maintain a professional, reassuring, and data-driven tone.";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    /// Named persona instruction strings, selectable per query.
    #[serde(default)]
    pub personas: HashMap<String, String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Directory scanned (non-recursively) for `*.pdf`. Auto-created.
    #[serde(default = "default_archive_dir")]
    pub dir: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            dir: default_archive_dir(),
        }
    }
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks. Must be < chunk_size.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// How many chunks to retrieve per query.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"mock"` (no embedding calls, order-preserving retrieval) or
    /// `"openai"` (any OpenAI-compatible embeddings endpoint).
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Expected vector dimensionality; responses that disagree are rejected.
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            dims: default_dims(),
            base_url: default_embedding_base_url(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_mock(&self) -> bool {
        self.provider == "mock"
    }
}

fn default_embedding_provider() -> String {
    "mock".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_dims() -> usize {
    1536
}
fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Primary chat-completion model identifier.
    #[serde(default = "default_primary_model")]
    pub primary: String,
    /// Optional fallback model tried after the primary fails.
    #[serde(default)]
    pub backup: Option<String>,
    #[serde(default = "default_model_base_url")]
    pub base_url: String,
    /// Response-length cap; always sent so cost and latency stay bounded.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Attempts per candidate model before moving to the next one.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Fixed delay between attempts and between candidates, in milliseconds.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Attribution headers sent with every completion request.
    #[serde(default = "default_referer")]
    pub referer: String,
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_model(),
            backup: None,
            base_url: default_model_base_url(),
            max_tokens: default_max_tokens(),
            attempts: default_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
            referer: default_referer(),
            title: default_title(),
        }
    }
}

fn default_primary_model() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_model_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_attempts() -> u32 {
    1
}
fn default_retry_delay_ms() -> u64 {
    500
}
fn default_referer() -> String {
    "https://github.com/docent".to_string()
}
fn default_title() -> String {
    "Docent".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    /// Trailing conversation turns included in each request.
    #[serde(default = "default_history_window")]
    pub window: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window: default_history_window(),
        }
    }
}

fn default_history_window() -> usize {
    5
}

impl Config {
    /// Resolve a persona by name, falling back to [`DEFAULT_PERSONA`].
    pub fn persona(&self, name: &str) -> String {
        self.personas
            .get(name)
            .cloned()
            .unwrap_or_else(|| DEFAULT_PERSONA.to_string())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Load a config file if it exists; otherwise use built-in defaults.
/// A fresh checkout runs with zero configuration (mock mode, `data/` dir).
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "mock" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be mock or openai.",
            other
        ),
    }
    if !config.embedding.is_mock() {
        if config.embedding.dims == 0 {
            anyhow::bail!("embedding.dims must be > 0 when provider is 'openai'");
        }
        if config.embedding.model.is_empty() {
            anyhow::bail!("embedding.model must be set when provider is 'openai'");
        }
    }

    if config.model.primary.is_empty() {
        anyhow::bail!("model.primary must not be empty");
    }
    if config.model.max_tokens == 0 {
        anyhow::bail!("model.max_tokens must be > 0");
    }
    if config.model.attempts == 0 {
        anyhow::bail!("model.attempts must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert!(config.embedding.is_mock());
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.history.window, 5);
    }

    #[test]
    fn empty_toml_parses_to_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.chunking.chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.archive.dir, PathBuf::from("data"));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = Config::default();
        config.chunking.overlap = config.chunking.chunk_size;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = Config::default();
        config.embedding.provider = "faiss".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn persona_lookup_falls_back_to_default() {
        let mut config = Config::default();
        config
            .personas
            .insert("clinical".to_string(), "Be clinical.".to_string());
        assert_eq!(config.persona("clinical"), "Be clinical.");
        assert_eq!(config.persona("missing"), DEFAULT_PERSONA);
    }
}
