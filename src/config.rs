//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a runnable local setup: in-memory vector index, OpenAI
//! embeddings and chat. API keys are read from the environment
//! (`OPENAI_API_KEY`, `PINECONE_API_KEY`), never from the file.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use medrag_core::chunk::{
    ChunkParams, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_MIN_CHUNK_LENGTH,
};
use medrag_core::context::{GenerationParams, DEFAULT_EXCERPT_LENGTH};
use medrag_core::router::{RoutingRule, SourceRouter};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DocumentsConfig {
    #[serde(default = "default_documents_path")]
    pub path: PathBuf,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_min_chunk_length")]
    pub min_chunk_length: usize,
    /// Chunks embedded and upserted per request.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for DocumentsConfig {
    fn default() -> Self {
        Self {
            path: default_documents_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_length: default_min_chunk_length(),
            batch_size: default_batch_size(),
        }
    }
}

impl DocumentsConfig {
    pub fn chunk_params(&self) -> ChunkParams {
        ChunkParams {
            chunk_size: self.chunk_size,
            overlap: self.chunk_overlap,
            min_length: self.min_chunk_length,
        }
    }
}

fn default_documents_path() -> PathBuf {
    PathBuf::from("./documents")
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}
fn default_min_chunk_length() -> usize {
    DEFAULT_MIN_CHUNK_LENGTH
}
fn default_batch_size() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Matches must score strictly above this to ground an answer.
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f64,
    #[serde(default = "default_max_results")]
    pub default_max_results: usize,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_excerpt_length")]
    pub excerpt_length: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_relevance_score: default_min_relevance_score(),
            default_max_results: default_max_results(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            excerpt_length: default_excerpt_length(),
        }
    }
}

impl SearchConfig {
    pub fn generation_params(&self) -> GenerationParams {
        GenerationParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

fn default_min_relevance_score() -> f64 {
    0.65
}
fn default_max_results() -> usize {
    5
}
fn default_temperature() -> f32 {
    0.3
}
fn default_max_tokens() -> u32 {
    500
}
fn default_excerpt_length() -> usize {
    DEFAULT_EXCERPT_LENGTH
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `openai`, `ollama`, or `disabled`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    /// Base URL override. Defaults to the provider's public endpoint.
    #[serde(default)]
    pub url: Option<String>,
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
            dims: default_embedding_dims(),
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// `openai` or `disabled`.
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_llm_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_llm_model(),
            url: None,
            max_retries: default_llm_max_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_provider() -> String {
    "openai".to_string()
}
fn default_llm_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_llm_max_retries() -> u32 {
    2
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// `memory` or `pinecone`.
    #[serde(default = "default_index_provider")]
    pub provider: String,
    #[serde(default = "default_index_name")]
    pub name: String,
    #[serde(default = "default_index_dimension")]
    pub dimension: usize,
    #[serde(default = "default_metric")]
    pub metric: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Control-plane URL override.
    #[serde(default)]
    pub control_url: Option<String>,
    /// Seconds to wait for a freshly created index to report ready.
    #[serde(default = "default_ready_timeout_secs")]
    pub ready_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            provider: default_index_provider(),
            name: default_index_name(),
            dimension: default_index_dimension(),
            metric: default_metric(),
            cloud: default_cloud(),
            region: default_region(),
            control_url: None,
            ready_timeout_secs: default_ready_timeout_secs(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_index_provider() -> String {
    "memory".to_string()
}
fn default_index_name() -> String {
    "medical-device-manuals".to_string()
}
fn default_index_dimension() -> usize {
    1536
}
fn default_metric() -> String {
    "cosine".to_string()
}
fn default_cloud() -> String {
    "aws".to_string()
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_ready_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_body_limit_bytes")]
    pub body_limit_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            body_limit_bytes: default_body_limit_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}
fn default_body_limit_bytes() -> usize {
    10 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` takes precedence.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RoutingConfig {
    /// Ordered rules; the built-in table is used when empty.
    #[serde(default)]
    pub rules: Vec<RoutingRule>,
}

impl RoutingConfig {
    pub fn router(&self) -> SourceRouter {
        if self.rules.is_empty() {
            SourceRouter::default()
        } else {
            SourceRouter::new(self.rules.clone())
        }
    }
}

/// Read, parse, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` when given, else `./medrag.toml` when present, else defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => load_config(path),
        None => {
            let local = Path::new("medrag.toml");
            if local.exists() {
                load_config(local)
            } else {
                let config = Config::default();
                validate(&config)?;
                Ok(config)
            }
        }
    }
}

pub fn validate(config: &Config) -> Result<()> {
    // Documents
    if config.documents.chunk_size == 0 {
        bail!("documents.chunk_size must be > 0");
    }
    if config.documents.batch_size == 0 {
        bail!("documents.batch_size must be > 0");
    }

    // Search
    if !(0.0..=1.0).contains(&config.search.min_relevance_score) {
        bail!("search.min_relevance_score must be in [0.0, 1.0]");
    }
    if config.search.default_max_results == 0 {
        bail!("search.default_max_results must be >= 1");
    }
    if !(0.0..=2.0).contains(&config.search.temperature) {
        bail!("search.temperature must be in [0.0, 2.0]");
    }
    if config.search.max_tokens == 0 {
        bail!("search.max_tokens must be > 0");
    }

    // Embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.model.trim().is_empty() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims == 0 {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims != config.index.dimension {
            bail!(
                "embedding.dims ({}) must equal index.dimension ({})",
                config.embedding.dims,
                config.index.dimension
            );
        }
    }

    // LLM
    match config.llm.provider.as_str() {
        "disabled" | "openai" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    // Index
    match config.index.provider.as_str() {
        "memory" | "pinecone" => {}
        other => bail!(
            "Unknown index provider: '{}'. Must be memory or pinecone.",
            other
        ),
    }
    if config.index.dimension == 0 {
        bail!("index.dimension must be > 0");
    }
    match config.index.metric.as_str() {
        "cosine" | "dotproduct" | "euclidean" => {}
        other => bail!(
            "Unknown index metric: '{}'. Must be cosine, dotproduct, or euclidean.",
            other
        ),
    }
    if config.index.provider == "pinecone" && config.index.name.trim().is_empty() {
        bail!("index.name must be set when provider is 'pinecone'");
    }

    // Routing
    for (i, rule) in config.routing.rules.iter().enumerate() {
        if rule.source.trim().is_empty() {
            bail!("routing.rules[{}].source must not be empty", i);
        }
        if rule.keywords.iter().all(|k| k.trim().is_empty()) {
            bail!("routing.rules[{}] needs at least one keyword", i);
        }
    }

    Ok(())
}
