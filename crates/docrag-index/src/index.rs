//! Per-document vector index.
//!
//! [`DocumentIndex`] puts each document in its own namespace of one shared
//! index. Record ids are derived from the document name and chunk id, so
//! re-ingesting a document overwrites its records instead of duplicating them.

use docrag_core::{
    CallPolicy, Chunk, EmbedError, IndexSpec, QueryMatch, RecordMetadata, RetrievedChunk,
    StoreError, VectorBackend, VectorRecord,
};
use docrag_embed::EmbedderPool;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Default number of records per upsert call.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Suffix of the record id that marks a finished ingestion.
const COMPLETION_SUFFIX: &str = "__complete";

/// How [`DocumentIndex::exists`] decides that a document is indexed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexStatusPolicy {
    /// Indexed as soon as the namespace holds any record. An ingestion that
    /// failed halfway still counts as indexed.
    #[default]
    AnyRecord,
    /// Indexed once a completion marker has been written after the last batch.
    CompletionMarker,
}

/// Id of the vector record for one chunk of a document.
#[must_use]
pub fn record_id(document: &str, chunk_id: &str) -> String {
    format!("{document}_{chunk_id}")
}

/// Id of the completion marker record of a document.
#[must_use]
pub fn marker_id(document: &str) -> String {
    format!("{document}{COMPLETION_SUFFIX}")
}

/// Vector index with one namespace per document.
pub struct DocumentIndex {
    backend: Arc<dyn VectorBackend>,
    embedder: Arc<EmbedderPool>,
    spec: IndexSpec,
    batch_size: usize,
    status_policy: IndexStatusPolicy,
    call: CallPolicy,
    ready: OnceCell<()>,
}

impl DocumentIndex {
    /// Create an index handle. Nothing is created remotely until
    /// [`ensure_index`](Self::ensure_index) runs.
    pub fn new(
        backend: Arc<dyn VectorBackend>,
        embedder: Arc<EmbedderPool>,
        spec: IndexSpec,
    ) -> Self {
        Self {
            backend,
            embedder,
            spec,
            batch_size: DEFAULT_BATCH_SIZE,
            status_policy: IndexStatusPolicy::default(),
            call: CallPolicy::default(),
            ready: OnceCell::new(),
        }
    }

    /// Set the number of records per upsert call (at least 1).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set how indexing status is derived.
    #[must_use]
    pub fn with_status_policy(mut self, policy: IndexStatusPolicy) -> Self {
        self.status_policy = policy;
        self
    }

    /// Set the timeout and retry budget for backend and embedding calls.
    #[must_use]
    pub fn with_call_policy(mut self, call: CallPolicy) -> Self {
        self.call = call;
        self
    }

    /// The index description.
    #[must_use]
    pub fn spec(&self) -> &IndexSpec {
        &self.spec
    }

    /// The indexing status policy.
    #[must_use]
    pub fn status_policy(&self) -> IndexStatusPolicy {
        self.status_policy
    }

    /// Create the index if it does not exist yet.
    ///
    /// Safe to call concurrently and repeatedly: the backend treats an
    /// existing index as success, and a handle only asks once.
    pub async fn ensure_index(&self) -> Result<(), StoreError> {
        self.ready
            .get_or_try_init(|| async {
                if self.embedder.dimension() != self.spec.dimension {
                    return Err(StoreError::Schema(format!(
                        "embedder {} produces {} dimensions, index {} expects {}",
                        self.embedder.model_name(),
                        self.embedder.dimension(),
                        self.spec.name,
                        self.spec.dimension
                    )));
                }

                let creation = self
                    .call
                    .run(
                        "index creation",
                        || self.backend.create_index(&self.spec),
                        StoreError::Timeout,
                    )
                    .await?;
                debug!("Index {} ready ({:?})", self.spec.name, creation);
                Ok(())
            })
            .await
            .map(|_| ())
    }

    /// Whether a document is indexed, per the status policy.
    pub async fn exists(&self, document: &str) -> Result<bool, StoreError> {
        match self.status_policy {
            IndexStatusPolicy::AnyRecord => {
                let count = self
                    .call
                    .run(
                        "namespace stats",
                        || self.backend.namespace_count(document),
                        StoreError::Timeout,
                    )
                    .await?;
                Ok(count > 0)
            }
            IndexStatusPolicy::CompletionMarker => {
                let ids = vec![marker_id(document)];
                let present = self
                    .call
                    .run(
                        "marker fetch",
                        || self.backend.fetch_ids(document, &ids),
                        StoreError::Timeout,
                    )
                    .await?;
                Ok(!present.is_empty())
            }
        }
    }

    /// Embed and write the chunks of a document into its namespace.
    ///
    /// Batches are embedded concurrently, up to the pool's limit, and written
    /// in chunk order. A failure stops the upsert and leaves the batches
    /// already written in place. Returns the number of chunk records written.
    pub async fn upsert(&self, document: &str, chunks: &[Chunk]) -> Result<usize, StoreError> {
        let batches: Vec<&[Chunk]> = chunks.chunks(self.batch_size).collect();
        let total = batches.len();

        let mut embedded = stream::iter(batches)
            .map(|batch| async move {
                let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
                let vectors = self
                    .call
                    .run(
                        "embedding",
                        || self.embedder.embed_batch(&texts),
                        EmbedError::Timeout,
                    )
                    .await?;
                if vectors.len() != batch.len() {
                    return Err(StoreError::Embedding(EmbedError::Response(format!(
                        "expected {} embeddings, got {}",
                        batch.len(),
                        vectors.len()
                    ))));
                }
                Ok::<_, StoreError>((batch, vectors))
            })
            .buffered(self.embedder.max_concurrent())
            .boxed();

        let mut written = 0;
        let mut batch_number = 0;
        while let Some(result) = embedded.next().await {
            let (batch, vectors) = result?;
            let records: Vec<VectorRecord> = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, values)| VectorRecord {
                    id: record_id(document, &chunk.id),
                    values,
                    metadata: RecordMetadata {
                        text: chunk.text.clone(),
                        document: document.to_string(),
                        chunk_id: chunk.id.clone(),
                        page: chunk.page,
                    },
                })
                .collect();

            self.write(document, &records).await?;
            written += records.len();
            batch_number += 1;
            debug!(
                "Wrote batch {}/{} for {:?} ({} records)",
                batch_number,
                total,
                document,
                records.len()
            );
        }

        if self.status_policy == IndexStatusPolicy::CompletionMarker {
            self.write(document, &[self.marker(document)]).await?;
        }

        info!("Upserted {} chunks for {:?}", written, document);
        Ok(written)
    }

    /// Retrieve up to `top_k` chunks of a document most similar to `question`,
    /// best first. An empty namespace yields an empty result.
    pub async fn query(
        &self,
        document: &str,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedChunk>, StoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector = self
            .call
            .run(
                "query embedding",
                || self.embedder.embed_query(question),
                EmbedError::Timeout,
            )
            .await?;

        // The marker may occupy one of the slots
        let requested = match self.status_policy {
            IndexStatusPolicy::AnyRecord => top_k,
            IndexStatusPolicy::CompletionMarker => top_k + 1,
        };
        let marker = marker_id(document);

        let matches: Vec<QueryMatch> = self
            .call
            .run(
                "vector query",
                || self.backend.query(document, &vector, requested),
                StoreError::Timeout,
            )
            .await?;

        let results: Vec<RetrievedChunk> = matches
            .into_iter()
            .filter(|m| m.id != marker)
            .take(top_k)
            .map(RetrievedChunk::from)
            .collect();
        debug!("Retrieved {} chunks from {:?}", results.len(), document);
        Ok(results)
    }

    async fn write(&self, document: &str, records: &[VectorRecord]) -> Result<(), StoreError> {
        self.call
            .run(
                "upsert",
                || self.backend.upsert(document, records),
                StoreError::Timeout,
            )
            .await
    }

    /// Marker record: a unit vector, since some backends reject all-zero values.
    fn marker(&self, document: &str) -> VectorRecord {
        let mut values = vec![0.0; self.spec.dimension];
        if let Some(first) = values.first_mut() {
            *first = 1.0;
        }
        VectorRecord {
            id: marker_id(document),
            values,
            metadata: RecordMetadata {
                text: String::new(),
                document: document.to_string(),
                chunk_id: COMPLETION_SUFFIX.trim_start_matches('_').to_string(),
                page: None,
            },
        }
    }
}
