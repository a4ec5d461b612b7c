//! OpenAI embeddings client.

use async_trait::async_trait;
use docrag_core::{Backoff, EmbedError, Embedder};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_MODEL: &str = "text-embedding-3-small";

/// Dimension of [`DEFAULT_MODEL`].
pub const DEFAULT_DIMENSION: usize = 1536;

/// Embedder backed by the OpenAI `/embeddings` endpoint.
///
/// Rate limiting and server errors are retried according to the configured
/// [`Backoff`]. Overall deadlines are left to the caller.
pub struct OpenAiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimension: usize,
    backoff: Backoff,
}

impl OpenAiEmbedder {
    /// Create a client for `model` at `base_url`.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimension: usize,
    ) -> Result<Self, EmbedError> {
        if api_key.trim().is_empty() {
            return Err(EmbedError::Request("missing OpenAI API key".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|e| EmbedError::Request(format!("invalid OpenAI API key: {e}")))?;
        headers.insert(AUTHORIZATION, auth);

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| EmbedError::Request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
            backoff: Backoff::default(),
        })
    }

    /// Create a client for the default model and endpoint.
    pub fn with_defaults(api_key: &str) -> Result<Self, EmbedError> {
        Self::new(api_key, DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_DIMENSION)
    }

    /// Use a different retry schedule.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send(&self, texts: &[&str]) -> Result<EmbeddingResponse, EmbedError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut attempt = 0u32;
        loop {
            let response = self.client.post(&self.endpoint).json(&request).send().await;
            let retry = match response {
                Ok(resp) if resp.status().is_success() => {
                    return resp.json().await.map_err(|e| {
                        EmbedError::Response(format!("failed to parse embedding response: {e}"))
                    });
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    if !Backoff::is_transient(status.as_u16()) || attempt >= self.backoff.max_retries
                    {
                        return Err(EmbedError::Request(format!(
                            "OpenAI embeddings request failed ({status}): {body}"
                        )));
                    }
                    format!("status {status}")
                }
                Err(e) => {
                    if !(e.is_connect() || e.is_timeout()) || attempt >= self.backoff.max_retries {
                        return Err(EmbedError::Request(e.to_string()));
                    }
                    e.to_string()
                }
            };

            attempt += 1;
            let delay = self.backoff.delay(attempt);
            warn!(
                "Embedding request failed ({}), retrying in {:?} ({}/{})",
                retry, delay, attempt, self.backoff.max_retries
            );
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut parsed = self.send(texts).await?;
        parsed.data.sort_by_key(|entry| entry.index);

        if parsed.data.len() != texts.len() {
            return Err(EmbedError::Response(format!(
                "OpenAI returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }
        if let Some(bad) = parsed
            .data
            .iter()
            .find(|entry| entry.embedding.len() != self.dimension)
        {
            return Err(EmbedError::Dimension {
                expected: self.dimension,
                actual: bad.embedding.len(),
            });
        }

        debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}
