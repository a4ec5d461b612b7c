//! Embedder pool for concurrent embedding operations.

use docrag_core::{EmbedError, Embedder};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Embedder shared across tasks, with a cap on in-flight requests.
pub struct EmbedderPool {
    embedder: Arc<dyn Embedder>,
    /// Semaphore to limit concurrent requests
    semaphore: Semaphore,
    max_concurrent: usize,
}

impl EmbedderPool {
    /// Create a new embedder pool.
    pub fn new(embedder: Arc<dyn Embedder>, max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            embedder,
            semaphore: Semaphore::new(max_concurrent),
            max_concurrent,
        }
    }

    /// Get the embedding dimension.
    pub fn dimension(&self) -> usize {
        self.embedder.dimension()
    }

    /// Get the model name.
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Get the underlying embedder.
    pub fn embedder(&self) -> Arc<dyn Embedder> {
        Arc::clone(&self.embedder)
    }

    /// Embed a batch of texts.
    pub async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Request(format!("semaphore error: {e}")))?;

        self.embedder.embed_text(texts).await
    }

    /// Embed a single query.
    pub async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbedError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| EmbedError::Request(format!("semaphore error: {e}")))?;

        self.embedder.embed_query(query).await
    }

    /// Permits currently available.
    pub fn available_permits(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Get max concurrent operations.
    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}
