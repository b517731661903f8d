//! The question-answering service.
//!
//! [`RagService`] owns the chunk store and the collaborators, and runs the
//! two pipelines:
//!
//! ```text
//! initialize: documents dir → extract → clean → split → embed → upsert → commit to store
//! ask:        question → route → embed → query → filter & score → assemble → generate
//! ```
//!
//! Lifecycle is `Idle → Ingesting → Ready`. The transition out of `Idle`
//! is a compare-and-swap, so at most one ingestion runs at a time. A
//! failed or abandoned ingestion returns the service to `Idle` and leaves
//! the chunk store untouched.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use medrag_core::chunk::{chunk_document, ChunkParams};
use medrag_core::clean::clean_text;
use medrag_core::context::{
    assemble, generate_answer, source_reference, GenerationParams, LOW_RELEVANCE_ANSWER,
    NO_MATCH_ANSWER,
};
use medrag_core::embedding::Embedder;
use medrag_core::index::memory::InMemoryIndex;
use medrag_core::index::VectorIndex;
use medrag_core::llm::LanguageModel;
use medrag_core::models::{DocumentChunk, DocumentInfo, QueryRequest, QueryResponse, VectorRecord};
use medrag_core::relevance::filter_and_score;
use medrag_core::retrieve::{candidate_count, Retriever};
use medrag_core::router::SourceRouter;
use medrag_core::store::ChunkStore;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::error::RagError;
use crate::extract::{PdfExtractor, TextExtractor};
use crate::llm::create_language_model;
use crate::pinecone::PineconeIndex;

pub const MIN_QUESTION_CHARS: usize = 5;
pub const MAX_QUESTION_CHARS: usize = 500;
pub const MAX_RESULTS_LIMIT: i64 = 100;

const IDLE: u8 = 0;
const INGESTING: u8 = 1;
const READY: u8 = 2;

/// External services the pipelines depend on.
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub llm: Arc<dyn LanguageModel>,
    pub extractor: Arc<dyn TextExtractor>,
}

impl Collaborators {
    /// Build the providers selected by configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            embedder: create_embedder(&config.embedding)?,
            index: create_index(config)?,
            llm: create_language_model(&config.llm)?,
            extractor: Arc::new(PdfExtractor),
        })
    }
}

pub fn create_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    match config.index.provider.as_str() {
        "memory" => Ok(Arc::new(InMemoryIndex::new(config.index.dimension))),
        "pinecone" => Ok(Arc::new(PineconeIndex::new(&config.index)?)),
        other => bail!("Unknown index provider: {}", other),
    }
}

/// Tunables copied out of [`Config`] at construction.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub documents_path: PathBuf,
    pub chunk_params: ChunkParams,
    pub batch_size: usize,
    pub min_relevance_score: f64,
    pub default_max_results: usize,
    pub generation: GenerationParams,
    pub excerpt_length: usize,
}

impl ServiceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            documents_path: config.documents.path.clone(),
            chunk_params: config.documents.chunk_params(),
            batch_size: config.documents.batch_size.max(1),
            min_relevance_score: config.search.min_relevance_score,
            default_max_results: config.search.default_max_results.max(1),
            generation: config.search.generation_params(),
            excerpt_length: config.search.excerpt_length,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeReport {
    pub processed_documents: usize,
    pub total_chunks: usize,
    pub documents: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentsReport {
    pub documents: Vec<DocumentInfo>,
    pub total_chunks: usize,
    pub initialized: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub initialized: bool,
    pub timestamp: DateTime<Utc>,
}

/// One document after extraction and splitting, before embedding.
#[derive(Debug, Clone)]
pub struct PreparedDocument {
    pub name: String,
    pub page_count: usize,
    pub chunks: Vec<DocumentChunk>,
}

/// Scan `settings.documents_path`, then extract, clean and split every PDF.
///
/// Needs no embedding, index or language-model client, so it also backs
/// `medrag ingest --dry-run`.
pub async fn prepare_documents(
    settings: &ServiceSettings,
    extractor: Arc<dyn TextExtractor>,
) -> Result<Vec<PreparedDocument>> {
    let files = scan_pdf_files(&settings.documents_path)?;
    if files.is_empty() {
        bail!(
            "No PDF files found in directory: {}",
            settings.documents_path.display()
        );
    }

    let mut prepared = Vec::with_capacity(files.len());
    for path in files {
        let document = prepare_file(&path, &settings.chunk_params, Arc::clone(&extractor))
            .await
            .with_context(|| format!("processing {}", path.display()))?;
        info!(
            document = %document.name,
            pages = document.page_count,
            chunks = document.chunks.len(),
            "Processed PDF"
        );
        prepared.push(document);
    }
    Ok(prepared)
}

async fn prepare_file(
    path: &Path,
    params: &ChunkParams,
    extractor: Arc<dyn TextExtractor>,
) -> Result<PreparedDocument> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let extracted = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
        .await
        .context("extraction task failed")??;

    let cleaned = clean_text(&extracted.text);
    let chunks = chunk_document(&name, &cleaned, params);
    if chunks.is_empty() {
        warn!(document = %name, "No chunks produced; document has too little text");
    }
    Ok(PreparedDocument {
        name,
        page_count: extracted.page_count,
        chunks,
    })
}

/// Returns the state to `Idle` on drop unless the ingestion completed.
struct IngestionGuard<'a> {
    state: &'a AtomicU8,
    completed: bool,
}

impl Drop for IngestionGuard<'_> {
    fn drop(&mut self) {
        if !self.completed {
            self.state.store(IDLE, Ordering::Release);
        }
    }
}

pub struct RagService {
    settings: ServiceSettings,
    router: SourceRouter,
    retriever: Retriever,
    llm: Arc<dyn LanguageModel>,
    extractor: Arc<dyn TextExtractor>,
    store: ChunkStore,
    state: AtomicU8,
}

impl RagService {
    pub fn new(settings: ServiceSettings, router: SourceRouter, collaborators: Collaborators) -> Self {
        Self {
            settings,
            router,
            retriever: Retriever::new(collaborators.embedder, collaborators.index),
            llm: collaborators.llm,
            extractor: collaborators.extractor,
            store: ChunkStore::new(),
            state: AtomicU8::new(IDLE),
        }
    }

    pub fn from_config(config: &Config, collaborators: Collaborators) -> Self {
        Self::new(
            ServiceSettings::from_config(config),
            config.routing.router(),
            collaborators,
        )
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        self.retriever.index()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.load(Ordering::Acquire) == READY
    }

    /// Ingest every PDF in the documents directory.
    pub async fn initialize(&self) -> Result<InitializeReport, RagError> {
        match self
            .state
            .compare_exchange(IDLE, INGESTING, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {}
            Err(READY) => return Err(RagError::AlreadyInitialized),
            Err(_) => return Err(RagError::IngestionInProgress),
        }
        let mut guard = IngestionGuard {
            state: &self.state,
            completed: false,
        };

        info!(path = %self.settings.documents_path.display(), "Initializing document index");
        match self.ingest().await {
            Ok(report) => {
                self.state.store(READY, Ordering::Release);
                guard.completed = true;
                info!(
                    documents = report.processed_documents,
                    chunks = report.total_chunks,
                    "System initialized"
                );
                Ok(report)
            }
            Err(e) => {
                error!(error = %format!("{:#}", e), "Initialization failed");
                Err(RagError::Ingestion(e))
            }
        }
    }

    /// Mark the service ready without ingesting when the vector index
    /// already holds records from an earlier run. Returns whether it did.
    pub async fn attach(&self) -> Result<bool, RagError> {
        let stats = self
            .index()
            .describe_stats()
            .await
            .context("reading index stats")
            .map_err(RagError::Retrieval)?;
        if stats.total_record_count == 0 {
            return Ok(false);
        }
        let attached = self
            .state
            .compare_exchange(IDLE, READY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if attached {
            info!(
                vectors = stats.total_record_count,
                "Attached to existing index; answers resolve content from vector metadata"
            );
        }
        Ok(attached)
    }

    /// Extract and split every PDF without embedding anything.
    pub async fn prepare_documents(&self) -> Result<Vec<PreparedDocument>> {
        prepare_documents(&self.settings, Arc::clone(&self.extractor)).await
    }

    async fn ingest(&self) -> Result<InitializeReport> {
        self.index()
            .ensure_ready()
            .await
            .context("preparing vector index")?;

        let prepared = self.prepare_documents().await?;
        let documents: Vec<String> = prepared.iter().map(|d| d.name.clone()).collect();
        let chunks: Vec<DocumentChunk> = prepared.into_iter().flat_map(|d| d.chunks).collect();

        self.upload(&chunks).await?;

        let total_chunks = chunks.len();
        self.store.put_all(chunks);
        Ok(InitializeReport {
            processed_documents: documents.len(),
            total_chunks,
            documents,
        })
    }

    /// Embed and upsert chunks in sequential batches.
    async fn upload(&self, chunks: &[DocumentChunk]) -> Result<()> {
        let batch_size = self.settings.batch_size;
        let total_batches = chunks.len().div_ceil(batch_size);

        for (i, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .retriever
                .embedder()
                .embed(&texts)
                .await
                .with_context(|| format!("embedding batch {}/{}", i + 1, total_batches))?;
            if vectors.len() != batch.len() {
                bail!(
                    "embedding batch {}/{}: expected {} vectors, got {}",
                    i + 1,
                    total_batches,
                    batch.len(),
                    vectors.len()
                );
            }

            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, values)| chunk.to_record(values))
                .collect();
            self.index()
                .upsert(&records)
                .await
                .with_context(|| format!("upserting batch {}/{}", i + 1, total_batches))?;

            info!(batch = i + 1, of = total_batches, size = batch.len(), "Uploaded batch");
        }
        Ok(())
    }

    /// Answer a question from the ingested manuals.
    pub async fn ask(&self, request: QueryRequest) -> Result<QueryResponse, RagError> {
        if !self.is_initialized() {
            return Err(RagError::NotInitialized);
        }
        let query = self.validate(&request)?;

        let source_filter = self.router.detect(&query.question);
        let top_k = candidate_count(query.max_results);
        let matches = self
            .retriever
            .search(&query.question, top_k, source_filter)
            .await
            .map_err(RagError::Retrieval)?;

        if matches.is_empty() {
            info!("No matches found");
            return Ok(not_found(NO_MATCH_ANSWER));
        }

        let selection = filter_and_score(
            matches,
            self.settings.min_relevance_score,
            query.max_results,
        );
        if selection.is_empty() {
            info!(
                min_score = self.settings.min_relevance_score,
                "No matches above relevance threshold"
            );
            return Ok(not_found(LOW_RELEVANCE_ANSWER));
        }
        info!(
            selected = selection.matches.len(),
            confidence = selection.confidence,
            "Relevant chunks selected"
        );

        let context = assemble(&selection.matches, &self.store);
        let answer = generate_answer(
            self.llm.as_ref(),
            &query.question,
            &context,
            self.settings.generation,
        )
        .await
        .map_err(RagError::Generation)?;
        debug!(chars = answer.chars().count(), "Answer generated");

        let sources = if query.include_source {
            selection
                .matches
                .iter()
                .map(|m| source_reference(m, self.settings.excerpt_length))
                .collect()
        } else {
            Vec::new()
        };

        Ok(QueryResponse {
            answer,
            sources,
            confidence: selection.confidence,
            timestamp: Utc::now(),
        })
    }

    fn validate(&self, request: &QueryRequest) -> Result<ValidQuery, RagError> {
        let question = request.question.trim();
        let length = question.chars().count();
        if length == 0 {
            return Err(RagError::validation("question", "is required"));
        }
        if length < MIN_QUESTION_CHARS {
            return Err(RagError::validation(
                "question",
                format!("must be at least {} characters", MIN_QUESTION_CHARS),
            ));
        }
        if length > MAX_QUESTION_CHARS {
            return Err(RagError::validation(
                "question",
                format!("must be at most {} characters", MAX_QUESTION_CHARS),
            ));
        }

        let max_results = match request.max_results {
            None => self.settings.default_max_results,
            Some(n) if (1..=MAX_RESULTS_LIMIT).contains(&n) => n as usize,
            Some(_) => {
                return Err(RagError::validation(
                    "maxResults",
                    format!("must be between 1 and {}", MAX_RESULTS_LIMIT),
                ))
            }
        };

        Ok(ValidQuery {
            question: question.to_string(),
            max_results,
            include_source: request.include_source.unwrap_or(true),
        })
    }

    pub fn documents(&self) -> DocumentsReport {
        DocumentsReport {
            documents: self.store.stats_by_source(),
            total_chunks: self.store.len(),
            initialized: self.is_initialized(),
        }
    }

    pub fn health(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            initialized: self.is_initialized(),
            timestamp: Utc::now(),
        }
    }
}

struct ValidQuery {
    question: String,
    max_results: usize,
    include_source: bool,
}

fn not_found(answer: &str) -> QueryResponse {
    QueryResponse {
        answer: answer.to_string(),
        sources: Vec::new(),
        confidence: 0.0,
        timestamp: Utc::now(),
    }
}

/// PDF files directly inside `dir`, sorted by file name. The directory is
/// created when missing.
pub fn scan_pdf_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating documents directory {}", dir.display()))?;
        info!(path = %dir.display(), "Created documents directory");
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("listing {}", dir.display()))?;
        let is_pdf = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);
        if entry.file_type().is_file() && is_pdf {
            files.push(entry.into_path());
        }
    }
    info!(count = files.len(), "Found PDF files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_scan_filters_and_sorts() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::write(tmp.path().join("b.pdf"), b"x").unwrap();
        fs::write(tmp.path().join("A.PDF"), b"x").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"x").unwrap();
        fs::create_dir(tmp.path().join("nested.pdf")).unwrap();
        fs::create_dir(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub").join("c.pdf"), b"x").unwrap();

        let names: Vec<String> = scan_pdf_files(tmp.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
    }

    #[test]
    fn test_scan_creates_missing_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("documents");
        assert!(scan_pdf_files(&dir).unwrap().is_empty());
        assert!(dir.is_dir());
    }

    #[test]
    fn test_guard_resets_unless_completed() {
        let state = AtomicU8::new(INGESTING);
        drop(IngestionGuard {
            state: &state,
            completed: false,
        });
        assert_eq!(state.load(Ordering::Acquire), IDLE);

        state.store(READY, Ordering::Release);
        drop(IngestionGuard {
            state: &state,
            completed: true,
        });
        assert_eq!(state.load(Ordering::Acquire), READY);
    }
}
