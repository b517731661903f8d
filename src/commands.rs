//! CLI command implementations.
//!
//! Each `run_*` function prints human-readable output to stdout; progress
//! and diagnostics go through `tracing`.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;

use medrag_core::chunk::{chunk_document, ChunkParams};
use medrag_core::clean::clean_text;
use medrag_core::models::QueryRequest;

use crate::config::Config;
use crate::extract::{PdfExtractor, TextExtractor};
use crate::rag::{create_index, prepare_documents, Collaborators, RagService, ServiceSettings};

const PREVIEW_CHARS: usize = 80;

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

pub fn build_service(config: &Config) -> Result<Arc<RagService>> {
    let collaborators = Collaborators::from_config(config)?;
    Ok(Arc::new(RagService::from_config(config, collaborators)))
}

/// Refuse commands whose result would vanish with the process.
///
/// The `memory` index lives only as long as one `medrag` invocation, so a
/// standalone `ingest` would pay for embeddings and throw them away, and
/// `stats` would always report an empty index.
fn require_persistent_index(config: &Config, command: &str) -> Result<()> {
    if config.index.provider == "memory" {
        bail!(
            "`medrag {}` needs a persistent vector index, but [index].provider is \"memory\" \
             (vectors are discarded when the process exits). Set [index].provider = \"pinecone\", \
             or use `medrag serve` / `medrag ask`, which ingest into memory on demand.",
            command
        );
    }
    Ok(())
}

/// `medrag ingest [--dry-run]`
pub async fn run_ingest(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        return run_dry_run(config, Arc::new(PdfExtractor)).await;
    }

    require_persistent_index(config, "ingest")?;
    let service = build_service(config)?;
    let report = service.initialize().await?;
    println!("Ingestion complete.");
    for name in &report.documents {
        println!("  {}", name);
    }
    println!("documents: {}", report.processed_documents);
    println!("chunks: {}", report.total_chunks);
    Ok(())
}

/// Extract and split only. Builds no API client, so no key is needed.
async fn run_dry_run(config: &Config, extractor: Arc<dyn TextExtractor>) -> Result<()> {
    let settings = ServiceSettings::from_config(config);
    let prepared = prepare_documents(&settings, extractor).await?;
    let mut total = 0;
    println!("Dry run: nothing embedded or uploaded.");
    for document in &prepared {
        println!(
            "  {}: {} pages, {} chunks",
            document.name,
            document.page_count,
            document.chunks.len()
        );
        total += document.chunks.len();
    }
    println!("documents: {}", prepared.len());
    println!("chunks: {}", total);
    Ok(())
}

/// `medrag ask "<question>"`
///
/// Reuses an already-populated vector index when there is one; otherwise
/// ingests the documents directory first.
pub async fn run_ask(
    service: &RagService,
    question: &str,
    max_results: Option<i64>,
    include_sources: bool,
) -> Result<()> {
    if !service.attach().await? {
        service
            .initialize()
            .await
            .context("ingesting documents before answering")?;
    }

    let mut request = QueryRequest::new(question).with_include_source(include_sources);
    if let Some(n) = max_results {
        request = request.with_max_results(n);
    }
    let response = service.ask(request).await?;

    println!("{}", response.answer);
    println!();
    println!("confidence: {:.2}", response.confidence);
    if !response.sources.is_empty() {
        println!("sources:");
        for (i, source) in response.sources.iter().enumerate() {
            println!(
                "  {}. {} (page ~{}, score {:.2})",
                i + 1,
                source.document,
                source.page,
                source.relevance_score
            );
            println!("     {}", source.excerpt);
        }
    }
    Ok(())
}

/// `medrag split <file.pdf>`: show how one document would be chunked.
pub fn run_split(path: &Path, params: &ChunkParams) -> Result<()> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let extracted = PdfExtractor.extract(&bytes)?;
    let cleaned = clean_text(&extracted.text);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let chunks = chunk_document(&name, &cleaned, params);

    println!(
        "{}: {} pages, {} chars cleaned, {} chunks (size {}, overlap {})",
        name,
        extracted.page_count,
        cleaned.chars().count(),
        chunks.len(),
        params.chunk_size,
        params.effective_overlap()
    );
    for chunk in &chunks {
        println!(
            "[{}] page ~{}, {} chars: {}",
            chunk.metadata.chunk_index,
            chunk.metadata.page,
            chunk.content.chars().count(),
            preview(&chunk.content)
        );
    }
    Ok(())
}

/// `medrag stats`
pub async fn run_stats(config: &Config) -> Result<()> {
    require_persistent_index(config, "stats")?;
    let index = create_index(config)?;
    let stats = index.describe_stats().await?;
    println!("index: {} ({})", config.index.name, index.name());
    println!("vectors: {}", stats.total_record_count);
    match stats.dimension {
        Some(d) => println!("dimension: {}", d),
        None => println!("dimension: unknown"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractedText;

    struct PlainText;

    impl TextExtractor for PlainText {
        fn extract(&self, bytes: &[u8]) -> Result<ExtractedText> {
            Ok(ExtractedText {
                text: String::from_utf8_lossy(bytes).into_owned(),
                page_count: 1,
            })
        }
    }

    fn config_for(dir: &Path) -> Config {
        let mut config = Config::default();
        config.documents.path = dir.to_path_buf();
        config
    }

    #[tokio::test]
    async fn test_dry_run_builds_no_api_clients() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("manual.pdf"),
            "Prime the fluidics cassette before every case and verify the vacuum reading.",
        )
        .unwrap();
        // Default providers are OpenAI; the dry run must not need a key.
        let config = config_for(tmp.path());
        assert_eq!(config.embedding.provider, "openai");
        run_dry_run(&config, Arc::new(PlainText)).await.unwrap();
    }

    #[tokio::test]
    async fn test_dry_run_reports_missing_pdfs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = run_dry_run(&config_for(tmp.path()), Arc::new(PlainText))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No PDF files found"));
    }

    #[tokio::test]
    async fn test_ingest_and_stats_refuse_memory_index() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = config_for(tmp.path());
        assert_eq!(config.index.provider, "memory");

        let err = run_ingest(&config, false).await.unwrap_err();
        assert!(err.to_string().contains("persistent vector index"), "{}", err);

        let err = run_stats(&config).await.unwrap_err();
        assert!(err.to_string().contains("[index].provider is \"memory\""), "{}", err);
    }

    #[test]
    fn test_pinecone_index_is_persistent() {
        let mut config = Config::default();
        config.index.provider = "pinecone".to_string();
        assert!(require_persistent_index(&config, "stats").is_ok());
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short"), "short");
        let long = "é".repeat(100);
        let p = preview(&long);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
    }
}
