//! In-memory [`VectorIndex`] for local runs and tests.
//!
//! Records live in a `HashMap` behind `std::sync::RwLock`. Queries are
//! brute-force cosine similarity over every eligible record.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Match, VectorRecord};

use super::{IndexStats, VectorIndex};

/// Brute-force in-memory vector index.
pub struct InMemoryIndex {
    dimension: usize,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            records: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if let Some(bad) = records.iter().find(|r| r.values.len() != self.dimension) {
            bail!(
                "vector {} has dimension {}, index expects {}",
                bad.id,
                bad.values.len(),
                self.dimension
            );
        }
        let mut stored = self.records.write().unwrap_or_else(|e| e.into_inner());
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source: Option<&str>,
    ) -> Result<Vec<Match>> {
        let stored = self.records.read().unwrap_or_else(|e| e.into_inner());
        let mut matches: Vec<Match> = stored
            .values()
            .filter(|r| source.map_or(true, |s| r.metadata.source == s))
            .map(|r| Match {
                id: r.id.clone(),
                score: cosine_similarity(vector, &r.values) as f64,
                metadata: r.metadata.clone(),
            })
            .collect();
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        let stored = self.records.read().unwrap_or_else(|e| e.into_inner());
        Ok(IndexStats {
            total_record_count: stored.len() as u64,
            dimension: Some(self.dimension),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VectorMetadata;

    fn record(id: &str, source: &str, values: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            values,
            metadata: VectorMetadata {
                source: source.to_string(),
                page: 1,
                chunk_index: 0,
                content: format!("content of {}", id),
            },
        }
    }

    #[tokio::test]
    async fn test_query_orders_by_similarity() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(&[
                record("far", "a.pdf", vec![0.0, 1.0]),
                record("near", "a.pdf", vec![1.0, 0.1]),
                record("exact", "b.pdf", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 10, None).await.unwrap();
        let ids: Vec<&str> = matches.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near", "far"]);
        assert!((matches[0].score - 1.0).abs() < 1e-6);
        assert_eq!(matches[0].metadata.content, "content of exact");
    }

    #[tokio::test]
    async fn test_query_source_filter_and_top_k() {
        let index = InMemoryIndex::new(2);
        index
            .upsert(&[
                record("a1", "a.pdf", vec![1.0, 0.0]),
                record("a2", "a.pdf", vec![0.5, 0.5]),
                record("b1", "b.pdf", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let matches = index.query(&[1.0, 0.0], 10, Some("a.pdf")).await.unwrap();
        assert!(matches.iter().all(|m| m.metadata.source == "a.pdf"));
        assert_eq!(matches.len(), 2);

        let top1 = index.query(&[1.0, 0.0], 1, None).await.unwrap();
        assert_eq!(top1.len(), 1);

        let none = index.query(&[1.0, 0.0], 5, Some("c.pdf")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id_and_stats() {
        let index = InMemoryIndex::new(2);
        assert_eq!(index.describe_stats().await.unwrap().total_record_count, 0);
        index
            .upsert(&[record("c1", "a.pdf", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(&[record("c1", "a.pdf", vec![0.0, 1.0])])
            .await
            .unwrap();
        let stats = index.describe_stats().await.unwrap();
        assert_eq!(stats.total_record_count, 1);
        assert_eq!(stats.dimension, Some(2));
    }

    #[tokio::test]
    async fn test_dimension_mismatch_rejected() {
        let index = InMemoryIndex::new(3);
        let err = index
            .upsert(&[record("c1", "a.pdf", vec![1.0, 0.0])])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("dimension"));
    }
}
