//! Pinecone serverless backend over the REST API.
//!
//! Index management goes to the control plane (`api.pinecone.io`). Record
//! operations go to the index's own data-plane host, which is looked up once
//! and cached.

use async_trait::async_trait;
use docrag_core::{
    Backoff, IndexCreation, IndexSpec, QueryMatch, RecordMetadata, StoreError, VectorBackend,
    VectorRecord,
};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Default control-plane URL.
pub const CONTROL_PLANE_URL: &str = "https://api.pinecone.io";

/// REST API version sent with every request.
pub const API_VERSION: &str = "2024-07";

/// Vector backend for a Pinecone serverless index.
pub struct PineconeBackend {
    client: Client,
    control_url: String,
    index_name: String,
    host: RwLock<Option<String>>,
    backoff: Backoff,
    ready_poll: Duration,
    ready_attempts: u32,
}

impl PineconeBackend {
    /// Create a backend for the index named `index_name`.
    pub fn new(api_key: &str, index_name: &str) -> Result<Self, StoreError> {
        if api_key.trim().is_empty() {
            return Err(StoreError::Init("missing Pinecone API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "Api-Key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|e| StoreError::Init(format!("invalid Pinecone API key: {e}")))?,
        );
        headers.insert("X-Pinecone-API-Version", HeaderValue::from_static(API_VERSION));

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::Init(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            control_url: CONTROL_PLANE_URL.to_string(),
            index_name: index_name.to_string(),
            host: RwLock::new(None),
            backoff: Backoff::default(),
            ready_poll: Duration::from_secs(1),
            ready_attempts: 60,
        })
    }

    /// Use a different control-plane URL.
    #[must_use]
    pub fn with_control_url(mut self, url: &str) -> Self {
        self.control_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Use a known data-plane host instead of looking it up.
    #[must_use]
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = RwLock::new(Some(host.trim_end_matches('/').to_string()));
        self
    }

    /// Use a different retry schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// How often and how many times to poll for readiness after creation.
    #[must_use]
    pub fn with_ready_poll(mut self, interval: Duration, attempts: u32) -> Self {
        self.ready_poll = interval;
        self.ready_attempts = attempts;
        self
    }

    /// Send a request, retrying transient failures.
    async fn send(&self, request: RequestBuilder) -> Result<Response, String> {
        let mut attempt = 0u32;
        loop {
            let attempt_request = request
                .try_clone()
                .ok_or_else(|| "request cannot be retried".to_string())?;

            let reason = match attempt_request.send().await {
                Ok(resp)
                    if Backoff::is_transient(resp.status().as_u16())
                        && attempt < self.backoff.max_retries =>
                {
                    format!("status {}", resp.status())
                }
                Ok(resp) => return Ok(resp),
                Err(e) if (e.is_connect() || e.is_timeout()) && attempt < self.backoff.max_retries => {
                    e.to_string()
                }
                Err(e) => return Err(e.to_string()),
            };

            attempt += 1;
            let delay = self.backoff.delay(attempt);
            warn!(
                "Pinecone request failed ({}), retrying in {:?} ({}/{})",
                reason, delay, attempt, self.backoff.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn describe(&self) -> Result<Option<IndexDescription>, StoreError> {
        let url = format!("{}/indexes/{}", self.control_url, self.index_name);
        let resp = self.send(self.client.get(&url)).await.map_err(StoreError::Init)?;

        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => resp
                .json()
                .await
                .map(Some)
                .map_err(|e| StoreError::Init(format!("invalid index description: {e}"))),
            _ => Err(StoreError::Init(failure(resp).await)),
        }
    }

    /// Poll until the index reports ready, caching its host.
    async fn wait_ready(&self) -> Result<(), StoreError> {
        for attempt in 0..self.ready_attempts.max(1) {
            if let Some(description) = self.describe().await? {
                if description.status.ready {
                    debug!("Index {} ready at {}", self.index_name, description.host);
                    *self.host.write().await = Some(description.host);
                    return Ok(());
                }
            }
            if attempt + 1 < self.ready_attempts {
                tokio::time::sleep(self.ready_poll).await;
            }
        }
        Err(StoreError::Init(format!(
            "index {} not ready after {} checks",
            self.index_name, self.ready_attempts
        )))
    }

    /// Base URL of the data plane.
    async fn data_url(&self) -> Result<String, StoreError> {
        if let Some(host) = self.host.read().await.as_ref() {
            return Ok(base_url(host));
        }

        let description = self
            .describe()
            .await?
            .ok_or_else(|| StoreError::Init(format!("index {} does not exist", self.index_name)))?;
        let url = base_url(&description.host);
        *self.host.write().await = Some(description.host);
        Ok(url)
    }
}

fn base_url(host: &str) -> String {
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

async fn failure(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    format!("Pinecone request failed ({status}): {body}")
}

#[async_trait]
impl VectorBackend for PineconeBackend {
    fn name(&self) -> &str {
        "pinecone"
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexCreation, StoreError> {
        let body = json!({
            "name": spec.name,
            "dimension": spec.dimension,
            "metric": spec.metric.as_str(),
            "spec": { "serverless": { "cloud": spec.cloud, "region": spec.region } },
        });
        let url = format!("{}/indexes", self.control_url);
        let resp = self
            .send(self.client.post(&url).json(&body))
            .await
            .map_err(StoreError::Init)?;

        let creation = match resp.status() {
            StatusCode::CONFLICT => IndexCreation::AlreadyExists,
            status if status.is_success() => IndexCreation::Created,
            _ => return Err(StoreError::Init(failure(resp).await)),
        };

        if creation == IndexCreation::Created {
            info!(
                "Created Pinecone index {} (dimension: {}, metric: {})",
                spec.name,
                spec.dimension,
                spec.metric.as_str()
            );
        }
        self.wait_ready().await?;
        Ok(creation)
    }

    async fn namespace_count(&self, namespace: &str) -> Result<u64, StoreError> {
        let url = format!("{}/describe_index_stats", self.data_url().await?);
        let resp = self
            .send(self.client.post(&url).json(&json!({})))
            .await
            .map_err(StoreError::Query)?;
        if !resp.status().is_success() {
            return Err(StoreError::Query(failure(resp).await));
        }

        let stats: IndexStats = resp
            .json()
            .await
            .map_err(|e| StoreError::Query(format!("invalid index stats: {e}")))?;
        Ok(stats
            .namespaces
            .get(namespace)
            .map_or(0, |ns| ns.vector_count))
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<(), StoreError> {
        if records.is_empty() {
            return Ok(());
        }

        let url = format!("{}/vectors/upsert", self.data_url().await?);
        let body = UpsertRequest {
            vectors: records,
            namespace,
        };
        let resp = self
            .send(self.client.post(&url).json(&body))
            .await
            .map_err(StoreError::Insert)?;
        if !resp.status().is_success() {
            return Err(StoreError::Insert(failure(resp).await));
        }

        debug!("Upserted {} records into {}", records.len(), namespace);
        Ok(())
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        let url = format!("{}/query", self.data_url().await?);
        let body = json!({
            "namespace": namespace,
            "vector": vector,
            "topK": top_k,
            "includeMetadata": true,
            "includeValues": false,
        });
        let resp = self
            .send(self.client.post(&url).json(&body))
            .await
            .map_err(StoreError::Query)?;
        if !resp.status().is_success() {
            return Err(StoreError::Query(failure(resp).await));
        }

        let parsed: QueryResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Query(format!("invalid query response: {e}")))?;

        let mut matches = Vec::with_capacity(parsed.matches.len());
        for m in parsed.matches {
            let Some(value) = m.metadata else {
                warn!("Skipping match {} without chunk metadata", m.id);
                continue;
            };
            let metadata = serde_json::from_value::<WireMetadata>(value)
                .map_err(|e| e.to_string())
                .and_then(RecordMetadata::try_from)
                .map_err(|e| StoreError::Query(format!("invalid metadata on {}: {e}", m.id)))?;
            matches.push(QueryMatch {
                id: m.id,
                score: m.score,
                metadata,
            });
        }
        Ok(matches)
    }

    async fn fetch_ids(&self, namespace: &str, ids: &[String]) -> Result<Vec<String>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/vectors/fetch", self.data_url().await?);
        let mut params: Vec<(&str, &str)> = ids.iter().map(|id| ("ids", id.as_str())).collect();
        params.push(("namespace", namespace));

        let resp = self
            .send(self.client.get(&url).query(&params))
            .await
            .map_err(StoreError::Query)?;
        if !resp.status().is_success() {
            return Err(StoreError::Query(failure(resp).await));
        }

        let parsed: FetchResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Query(format!("invalid fetch response: {e}")))?;
        Ok(ids
            .iter()
            .filter(|id| parsed.vectors.contains_key(*id))
            .cloned()
            .collect())
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    status: IndexStatus,
}

#[derive(Debug, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
}

#[derive(Debug, Deserialize)]
struct IndexStats {
    #[serde(default)]
    namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NamespaceStats {
    #[serde(default)]
    vector_count: u64,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<WireMatch>,
}

#[derive(Debug, Deserialize)]
struct WireMatch {
    id: String,
    #[serde(default)]
    score: f32,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Chunk metadata as returned by Pinecone, which stores every number as a float.
#[derive(Debug, Deserialize)]
struct WireMetadata {
    text: String,
    document: String,
    chunk_id: String,
    #[serde(default)]
    page: Option<f64>,
}

impl TryFrom<WireMetadata> for RecordMetadata {
    type Error = String;

    fn try_from(wire: WireMetadata) -> Result<Self, Self::Error> {
        let page = match wire.page {
            None => None,
            Some(page) if page.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&page) => {
                Some(page as u32)
            }
            Some(page) => return Err(format!("page {page} is not a page number")),
        };
        Ok(Self {
            text: wire.text,
            document: wire.document,
            chunk_id: wire.chunk_id,
            page,
        })
    }
}

#[derive(Debug, Deserialize)]
struct FetchResponse {
    #[serde(default)]
    vectors: HashMap<String, serde_json::Value>,
}
