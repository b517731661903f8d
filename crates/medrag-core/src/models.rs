//! Core data models used throughout medrag.
//!
//! These types represent the chunks, vector records, matches, and
//! question/answer payloads that flow through the ingestion and query
//! pipelines. Wire-facing types serialize with camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of chunks treated as one "page" when approximating page numbers.
pub const CHUNKS_PER_PAGE: usize = 5;

/// A retrievable segment of one ingested document.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
}

/// Provenance of a [`DocumentChunk`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkMetadata {
    /// Originating document filename.
    pub source: String,
    /// 1-based approximate page, see [`approximate_page`].
    pub page: u32,
    /// 0-based position in the document's chunk sequence.
    pub chunk_index: u32,
    pub timestamp: DateTime<Utc>,
}

impl DocumentChunk {
    /// Create a chunk stamped with the current time.
    ///
    /// The id is a name-based UUID over source, position and content, so
    /// re-ingesting the same document yields the same ids and overwrites
    /// its earlier vectors instead of duplicating them.
    pub fn new(source: &str, chunk_index: usize, content: String) -> Self {
        Self {
            id: chunk_id(source, chunk_index, &content),
            content,
            metadata: ChunkMetadata {
                source: source.to_string(),
                page: approximate_page(chunk_index),
                chunk_index: chunk_index as u32,
                timestamp: Utc::now(),
            },
        }
    }

    /// Build the vector-index record for this chunk from its embedding.
    ///
    /// The full chunk content is carried in the metadata so a match can be
    /// resolved even when the chunk store no longer holds the chunk.
    pub fn to_record(&self, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: self.id.clone(),
            values,
            metadata: VectorMetadata {
                source: self.metadata.source.clone(),
                page: self.metadata.page,
                chunk_index: self.metadata.chunk_index,
                content: self.content.clone(),
            },
        }
    }
}

/// Stable chunk id: UUID v5 in the OID namespace.
pub fn chunk_id(source: &str, chunk_index: usize, content: &str) -> String {
    let name = format!("{}\n{}\n{}", source, chunk_index, content);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

/// Approximate a 1-based page number from a chunk position.
pub fn approximate_page(chunk_index: usize) -> u32 {
    (chunk_index / CHUNKS_PER_PAGE) as u32 + 1
}

/// Metadata attached to every vector in the index.
///
/// Every field defaults when absent so matches written by older ingestions
/// (or other tools) still deserialize.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VectorMetadata {
    pub source: String,
    #[serde(deserialize_with = "whole_number")]
    pub page: u32,
    #[serde(deserialize_with = "whole_number")]
    pub chunk_index: u32,
    pub content: String,
}

/// Vector stores keep numeric metadata as doubles (`2.0`), so accept any number.
fn whole_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.max(0.0) as u32)
}

/// A vector and its metadata as upserted into the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: VectorMetadata,
}

/// A retrieval result produced by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: String,
    /// Cosine similarity in `[0, 1]`.
    pub score: f64,
    #[serde(default)]
    pub metadata: VectorMetadata,
}

/// Incoming question, as posted to `/ask`.
///
/// `max_results` is kept signed so that non-positive values reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub max_results: Option<i64>,
    #[serde(default)]
    pub include_source: Option<bool>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            max_results: None,
            include_source: None,
        }
    }

    pub fn with_max_results(mut self, max_results: i64) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn with_include_source(mut self, include_source: bool) -> Self {
        self.include_source = Some(include_source);
        self
    }
}

/// Answer returned from `/ask`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceReference>,
    /// Mean relevance of the grounding chunks, `0` when nothing grounded the answer.
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// One grounding passage cited in a [`QueryResponse`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    pub document: String,
    pub page: u32,
    pub relevance_score: f64,
    pub excerpt: String,
}

/// Per-document ingestion statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentInfo {
    pub name: String,
    pub chunk_count: usize,
    pub last_updated: DateTime<Utc>,
}
