//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait covers everything the pipeline needs from a
//! similarity-search backend: provisioning, upserts, filtered top-k
//! queries, and record counts. Implementations must be `Send + Sync` and
//! keep ids stable, since a match id is resolved against the chunk store.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Match, VectorRecord};

/// Summary returned by [`VectorIndex::describe_stats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub total_record_count: u64,
    pub dimension: Option<usize>,
}

/// Abstract vector storage and similarity search.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_ready`](VectorIndex::ensure_ready) | Create the index if missing, wait until it serves |
/// | [`upsert`](VectorIndex::upsert) | Insert or replace vectors by id |
/// | [`query`](VectorIndex::query) | Top-k by descending similarity, optionally restricted to one source |
/// | [`describe_stats`](VectorIndex::describe_stats) | Record count and dimension |
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend name used in logs (e.g. `"memory"`, `"pinecone"`).
    fn name(&self) -> &str;

    /// Provision the index if it does not exist and wait until it is ready.
    async fn ensure_ready(&self) -> Result<()>;

    /// Insert or replace vectors, keyed by record id.
    async fn upsert(&self, records: &[VectorRecord]) -> Result<()>;

    /// Return up to `top_k` matches ordered by descending score.
    ///
    /// With `source` set, only records whose `metadata.source` equals it
    /// are eligible. An index with no eligible records returns an empty
    /// vector, not an error.
    async fn query(&self, vector: &[f32], top_k: usize, source: Option<&str>)
        -> Result<Vec<Match>>;

    async fn describe_stats(&self) -> Result<IndexStats>;
}
