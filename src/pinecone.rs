//! Pinecone REST client implementing [`VectorIndex`].
//!
//! Control plane (`api.pinecone.io`): list, create, and describe indexes.
//! Data plane (`https://{host}`): upsert, query, and stats. The data-plane
//! host is learned from `describe` and cached for the life of the client.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use medrag_core::index::{IndexStats, VectorIndex};
use medrag_core::models::{Match, VectorRecord};

use crate::config::IndexConfig;
use crate::retry::send_json;

const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const READY_POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct PineconeIndex {
    client: reqwest::Client,
    api_key: String,
    control_url: String,
    name: String,
    dimension: usize,
    metric: String,
    cloud: String,
    region: String,
    ready_timeout: Duration,
    max_retries: u32,
    host: OnceCell<String>,
}

#[derive(Deserialize)]
struct IndexList {
    #[serde(default)]
    indexes: Vec<IndexSummary>,
}

#[derive(Deserialize)]
struct IndexSummary {
    name: String,
}

#[derive(Deserialize)]
struct IndexDescription {
    #[serde(default)]
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Deserialize, Default)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default, alias = "totalRecordCount")]
    total_vector_count: u64,
    #[serde(default)]
    dimension: Option<usize>,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow!("PINECONE_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &IndexConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            control_url: config
                .control_url
                .as_deref()
                .unwrap_or(CONTROL_PLANE_URL)
                .trim_end_matches('/')
                .to_string(),
            name: config.name.clone(),
            dimension: config.dimension,
            metric: config.metric.clone(),
            cloud: config.cloud.clone(),
            region: config.region.clone(),
            ready_timeout: Duration::from_secs(config.ready_timeout_secs),
            max_retries: config.max_retries,
            host: OnceCell::new(),
        })
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
    }

    fn post(&self, url: &str, body: &serde_json::Value) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(body)
    }

    async fn index_exists(&self) -> Result<bool> {
        let url = format!("{}/indexes", self.control_url);
        let json = send_json("Pinecone", self.max_retries, || self.get(&url)).await?;
        let list: IndexList = serde_json::from_value(json)
            .map_err(|e| anyhow!("Invalid Pinecone index list: {}", e))?;
        Ok(list.indexes.iter().any(|index| index.name == self.name))
    }

    async fn create_index(&self) -> Result<()> {
        let url = format!("{}/indexes", self.control_url);
        let body = create_index_body(
            &self.name,
            self.dimension,
            &self.metric,
            &self.cloud,
            &self.region,
        );
        send_json("Pinecone", self.max_retries, || self.post(&url, &body)).await?;
        Ok(())
    }

    async fn describe(&self) -> Result<IndexDescription> {
        let url = format!("{}/indexes/{}", self.control_url, self.name);
        let json = send_json("Pinecone", self.max_retries, || self.get(&url)).await?;
        serde_json::from_value(json).map_err(|e| anyhow!("Invalid Pinecone index description: {}", e))
    }

    async fn wait_until_ready(&self) -> Result<String> {
        let deadline = Instant::now() + self.ready_timeout;
        loop {
            let description = self.describe().await?;
            if description.status.ready && !description.host.is_empty() {
                return Ok(description.host);
            }
            if Instant::now() >= deadline {
                bail!(
                    "Pinecone index '{}' not ready after {:?} (state: {})",
                    self.name,
                    self.ready_timeout,
                    description.status.state
                );
            }
            debug!(state = %description.status.state, "Waiting for index to become ready");
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    /// Data-plane base URL, resolved on first use.
    async fn data_url(&self) -> Result<&str> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe().await?;
                if description.host.is_empty() {
                    bail!("Pinecone index '{}' has no host yet", self.name);
                }
                Ok(data_plane_url(&description.host))
            })
            .await?;
        Ok(host.as_str())
    }
}

/// Request body for creating a serverless index.
fn create_index_body(
    name: &str,
    dimension: usize,
    metric: &str,
    cloud: &str,
    region: &str,
) -> serde_json::Value {
    serde_json::json!({
        "name": name,
        "dimension": dimension,
        "metric": metric,
        "spec": {
            "serverless": {
                "cloud": cloud,
                "region": region,
            }
        }
    })
}

/// Request body for a top-k query, optionally filtered to one source.
fn query_body(vector: &[f32], top_k: usize, source: Option<&str>) -> serde_json::Value {
    let mut body = serde_json::json!({
        "vector": vector,
        "topK": top_k,
        "includeMetadata": true,
        "includeValues": false,
    });
    if let Some(source) = source {
        body["filter"] = serde_json::json!({ "source": { "$eq": source } });
    }
    body
}

/// Hosts come back without a scheme; an explicit scheme is kept as-is.
fn data_plane_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{}", host)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn ensure_ready(&self) -> Result<()> {
        info!(index = %self.name, "Checking if index exists");
        if !self.index_exists().await? {
            info!(
                index = %self.name,
                dimension = self.dimension,
                metric = %self.metric,
                "Creating index"
            );
            self.create_index().await?;
        }
        let host = self.wait_until_ready().await?;
        // A concurrent resolver may have set it already; both saw the same host.
        let _ = self.host.set(data_plane_url(&host));
        info!(index = %self.name, "Index ready");
        Ok(())
    }

    async fn upsert(&self, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let url = format!("{}/vectors/upsert", self.data_url().await?);
        let body = serde_json::json!({ "vectors": records });
        send_json("Pinecone", self.max_retries, || self.post(&url, &body)).await?;
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        source: Option<&str>,
    ) -> Result<Vec<Match>> {
        let url = format!("{}/query", self.data_url().await?);
        let body = query_body(vector, top_k, source);
        let json = send_json("Pinecone", self.max_retries, || self.post(&url, &body)).await?;
        let parsed: QueryResponse = serde_json::from_value(json)
            .map_err(|e| anyhow!("Invalid Pinecone query response: {}", e))?;
        Ok(parsed.matches)
    }

    async fn describe_stats(&self) -> Result<IndexStats> {
        let url = format!("{}/describe_index_stats", self.data_url().await?);
        let body = serde_json::json!({});
        let json = send_json("Pinecone", self.max_retries, || self.post(&url, &body)).await?;
        let stats: StatsResponse = serde_json::from_value(json)
            .map_err(|e| anyhow!("Invalid Pinecone stats response: {}", e))?;
        info!(vectors = stats.total_vector_count, "Index stats retrieved");
        Ok(IndexStats {
            total_record_count: stats.total_vector_count,
            dimension: stats.dimension,
        })
    }
}
