//! Similarity retrieval over the vector index.

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::embedding::{embed_one, Embedder};
use crate::index::VectorIndex;
use crate::models::Match;

/// Number of candidates requested per answer slot, leaving headroom for
/// relevance filtering.
pub const CANDIDATE_MULTIPLIER: usize = 2;

/// Candidate count to request from the index for `max_results` answers.
pub fn candidate_count(max_results: usize) -> usize {
    max_results.saturating_mul(CANDIDATE_MULTIPLIER)
}

/// Embeds questions and queries the vector index.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Return up to `top_k` matches for `question`, in the index's
    /// descending-score order, restricted to `source_filter` when set.
    pub async fn search(
        &self,
        question: &str,
        top_k: usize,
        source_filter: Option<&str>,
    ) -> Result<Vec<Match>> {
        info!(top_k, source_filter, "Searching for similar chunks");
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed_one(self.embedder.as_ref(), question).await?;
        let matches = self.index.query(&query_vec, top_k, source_filter).await?;

        info!(found = matches.len(), "Similar chunks found");
        Ok(matches)
    }
}
