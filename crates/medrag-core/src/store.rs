//! In-memory chunk store.
//!
//! Maps chunk ids to their full content and metadata. It is the source of
//! truth for resolving a vector-index match back into chunk text. Writes
//! happen during ingestion only; queries take read locks.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::models::{DocumentChunk, DocumentInfo};

/// Append-only map from chunk id to [`DocumentChunk`].
#[derive(Debug, Default)]
pub struct ChunkStore {
    chunks: RwLock<HashMap<String, DocumentChunk>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one chunk. An existing chunk with the same id is kept.
    pub fn put(&self, chunk: DocumentChunk) {
        let mut chunks = self.chunks.write().unwrap_or_else(|e| e.into_inner());
        chunks.entry(chunk.id.clone()).or_insert(chunk);
    }

    /// Insert a batch of chunks under one write lock.
    pub fn put_all(&self, batch: impl IntoIterator<Item = DocumentChunk>) {
        let mut chunks = self.chunks.write().unwrap_or_else(|e| e.into_inner());
        for chunk in batch {
            chunks.entry(chunk.id.clone()).or_insert(chunk);
        }
    }

    pub fn get(&self, id: &str) -> Option<DocumentChunk> {
        let chunks = self.chunks.read().unwrap_or_else(|e| e.into_inner());
        chunks.get(id).cloned()
    }

    /// Full content for a chunk id, if the chunk is held.
    pub fn content(&self, id: &str) -> Option<String> {
        let chunks = self.chunks.read().unwrap_or_else(|e| e.into_inner());
        chunks.get(id).map(|c| c.content.clone())
    }

    pub fn len(&self) -> usize {
        self.chunks.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All chunks of one source in `chunk_index` order.
    pub fn by_source(&self, source: &str) -> Vec<DocumentChunk> {
        let chunks = self.chunks.read().unwrap_or_else(|e| e.into_inner());
        let mut found: Vec<DocumentChunk> = chunks
            .values()
            .filter(|c| c.metadata.source == source)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.metadata.chunk_index);
        found
    }

    /// Chunk count and most recent chunk timestamp per source, ordered by source name.
    pub fn stats_by_source(&self) -> Vec<DocumentInfo> {
        let chunks = self.chunks.read().unwrap_or_else(|e| e.into_inner());
        let mut by_source: BTreeMap<&str, (usize, DateTime<Utc>)> = BTreeMap::new();
        for chunk in chunks.values() {
            let ts = chunk.metadata.timestamp;
            by_source
                .entry(chunk.metadata.source.as_str())
                .and_modify(|(count, last)| {
                    *count += 1;
                    if ts > *last {
                        *last = ts;
                    }
                })
                .or_insert((1, ts));
        }
        by_source
            .into_iter()
            .map(|(name, (chunk_count, last_updated))| DocumentInfo {
                name: name.to_string(),
                chunk_count,
                last_updated,
            })
            .collect()
    }
}
