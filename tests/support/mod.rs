//! In-process fakes for every collaborator of the RAG service.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use medrag::config::Config;
use medrag::extract::{ExtractedText, TextExtractor};
use medrag::rag::{Collaborators, RagService};
use medrag_core::embedding::Embedder;
use medrag_core::index::memory::InMemoryIndex;
use medrag_core::index::{IndexStats, VectorIndex};
use medrag_core::llm::{CompletionRequest, LanguageModel};
use medrag_core::models::{Match, VectorMetadata, VectorRecord};
use medrag_core::router::{
    ALCON_CENTURION_MANUAL, KARL_STORZ_ENDOSCOPE_MANUAL, ZEISS_OPMI_PENTERO_MANUAL,
};

pub const ALCON_TEXT: &str = "The Centurion vision system limits vacuum to 650 mmHg. \
Raise vacuum slowly and set aspiration flow before priming the fluidics cassette.";
pub const STORZ_TEXT: &str = "The Karl Storz light source uses a xenon lamp. \
Replace the lamp after 500 hours and check light output before every procedure.";
pub const ZEISS_TEXT: &str = "Balance the OPMI Pentero stand before surgery. \
Release the brakes, then balance the stand arms until the microscope floats freely.";

pub const MODEL_ANSWER: &str = "Vacuum is limited to 650 mmHg.";

/// Writes the three bundled manuals (as plain text) into `dir`.
pub fn write_manuals(dir: &Path) {
    std::fs::write(dir.join(ALCON_CENTURION_MANUAL), ALCON_TEXT).unwrap();
    std::fs::write(dir.join(KARL_STORZ_ENDOSCOPE_MANUAL), STORZ_TEXT).unwrap();
    std::fs::write(dir.join(ZEISS_OPMI_PENTERO_MANUAL), ZEISS_TEXT).unwrap();
}

// ============ Extractor ============

/// Treats file bytes as UTF-8 text. Bytes starting with `CORRUPT` fail.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<ExtractedText> {
        if bytes.starts_with(b"CORRUPT") {
            bail!("PDF text extraction failed: bad xref table");
        }
        Ok(ExtractedText {
            text: String::from_utf8_lossy(bytes).into_owned(),
            page_count: 1,
        })
    }
}

// ============ Embedder ============

const VOCAB: [&str; 6] = ["vacuum", "aspiration", "light", "lamp", "balance", "stand"];

/// Bag-of-words embedder over a fixed vocabulary plus a bias dimension.
///
/// Can be told to fail its first `fail_first` calls, or only the call
/// numbered `fail_at` (0-based), and to sleep before answering.
#[derive(Default)]
pub struct KeywordEmbedder {
    pub calls: AtomicUsize,
    pub fail_first: usize,
    pub fail_at: Option<usize>,
    pub delay: Option<Duration>,
}

impl KeywordEmbedder {
    pub fn failing_first(n: usize) -> Self {
        Self {
            fail_first: n,
            ..Default::default()
        }
    }

    pub fn failing_at(call: usize) -> Self {
        Self {
            fail_at: Some(call),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn keyword_vector(text: &str) -> Vec<f32> {
    let lower = text.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    let mut v: Vec<f32> = VOCAB
        .iter()
        .map(|word| tokens.iter().filter(|t| *t == word).count() as f32)
        .collect();
    v.push(0.05);
    v
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }
    fn dims(&self) -> usize {
        VOCAB.len() + 1
    }
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if call < self.fail_first || self.fail_at == Some(call) {
            bail!("OpenAI API error 500 Internal Server Error: upstream overloaded");
        }
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

pub fn keyword_index() -> Arc<InMemoryIndex> {
    Arc::new(InMemoryIndex::new(VOCAB.len() + 1))
}

// ============ Scripted index ============

/// Returns canned matches and records every query it receives.
pub struct ScriptedIndex {
    pub matches: Vec<Match>,
    pub record_count: u64,
    pub queries: Mutex<Vec<(usize, Option<String>)>>,
}

impl ScriptedIndex {
    pub fn new(matches: Vec<Match>) -> Self {
        Self {
            matches,
            record_count: 100,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Matches `m0..` with the given scores, all from the Alcon manual.
    pub fn with_scores(scores: &[f64]) -> Self {
        Self::new(
            scores
                .iter()
                .enumerate()
                .map(|(i, &score)| scored_match(&format!("m{}", i), score))
                .collect(),
        )
    }

    pub fn recorded(&self) -> Vec<(usize, Option<String>)> {
        self.queries.lock().unwrap().clone()
    }
}

pub fn scored_match(id: &str, score: f64) -> Match {
    Match {
        id: id.to_string(),
        score,
        metadata: VectorMetadata {
            source: ALCON_CENTURION_MANUAL.to_string(),
            page: 2,
            chunk_index: 5,
            content: format!("Stored passage {} about calibrating the Centurion.", id),
        },
    }
}

#[async_trait]
impl VectorIndex for ScriptedIndex {
    fn name(&self) -> &str {
        "scripted"
    }
    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }
    async fn upsert(&self, _records: &[VectorRecord]) -> Result<()> {
        Ok(())
    }
    async fn query(
        &self,
        _vector: &[f32],
        top_k: usize,
        source: Option<&str>,
    ) -> Result<Vec<Match>> {
        self.queries
            .lock()
            .unwrap()
            .push((top_k, source.map(str::to_string)));
        Ok(self.matches.iter().take(top_k).cloned().collect())
    }
    async fn describe_stats(&self) -> Result<IndexStats> {
        Ok(IndexStats {
            total_record_count: self.record_count,
            dimension: None,
        })
    }
}

// ============ Language model ============

/// Records requests; answers [`MODEL_ANSWER`] or fails when `broken`.
#[derive(Default)]
pub struct RecordingModel {
    pub broken: bool,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl RecordingModel {
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|r| r.user_prompt.clone())
    }
}

#[async_trait]
impl LanguageModel for RecordingModel {
    fn model_name(&self) -> &str {
        "recording"
    }
    async fn complete(&self, request: &CompletionRequest) -> Result<Option<String>> {
        self.requests.lock().unwrap().push(request.clone());
        if self.broken {
            bail!("OpenAI API error 503 Service Unavailable");
        }
        Ok(Some(MODEL_ANSWER.to_string()))
    }
}

// ============ Assembly ============

pub fn test_config(documents: &Path) -> Config {
    let mut config = Config::default();
    config.documents.path = documents.to_path_buf();
    config.documents.batch_size = 2;
    config
}

pub fn service_with(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    llm: Arc<dyn LanguageModel>,
) -> Arc<RagService> {
    Arc::new(RagService::from_config(
        config,
        Collaborators {
            embedder,
            index,
            llm,
            extractor: Arc::new(PlainTextExtractor),
        },
    ))
}
