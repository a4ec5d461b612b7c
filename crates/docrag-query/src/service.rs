//! Question answering over stored documents.

use docrag_core::{
    Answer, CallPolicy, DocumentKind, DocumentStatus, Error, GenerateError, GenerationRequest,
    Generator, Result, StorageError,
};
use docrag_index::{DocumentIndex, IngestReport, Ingestor};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::lock::IngestLocks;
use crate::prompt::{build_context, build_prompt, NO_CONTEXT_ANSWER, SYSTEM_INSTRUCTION};

/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 3;

/// Query service configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryConfig {
    /// Chunks retrieved per question
    pub top_k: usize,
    /// Sampling temperature for generation
    pub temperature: f32,
    /// Whether first-time ingestion of a document is serialized
    pub serialize_ingestion: bool,
    /// Deadline and retry budget for storage listing; generation gets the
    /// same deadline without retries
    pub call: CallPolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            temperature: 0.0,
            serialize_ingestion: true,
            call: CallPolicy::default(),
        }
    }
}

/// Answers questions about documents in file storage.
///
/// Each question runs check existence → ingest if needed → retrieve →
/// generate. Failures other than a missing document come back as
/// [`Error::Failed`] carrying the original message.
pub struct QueryService {
    ingestor: Arc<Ingestor>,
    generator: Arc<dyn Generator>,
    config: QueryConfig,
    locks: IngestLocks,
}

impl QueryService {
    /// Create a new query service.
    pub fn new(
        ingestor: Arc<Ingestor>,
        generator: Arc<dyn Generator>,
        config: QueryConfig,
    ) -> Self {
        Self {
            ingestor,
            generator,
            config,
            locks: IngestLocks::new(),
        }
    }

    /// The service configuration.
    #[must_use]
    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    fn index(&self) -> &DocumentIndex {
        self.ingestor.index()
    }

    /// Stored documents with a supported format, and whether each is indexed.
    pub async fn list_documents(&self) -> Result<Vec<DocumentStatus>> {
        self.list_inner().await.map_err(|e| self.boundary("listing", e))
    }

    /// Index a document unless it is already indexed.
    ///
    /// Returns `None` when the document was already indexed.
    pub async fn ingest(&self, document: &str) -> Result<Option<IngestReport>> {
        self.ingest_inner(document)
            .await
            .map_err(|e| self.boundary(document, e))
    }

    /// Answer a question about a document.
    pub async fn ask(&self, document: &str, question: &str) -> Result<Answer> {
        self.ask_inner(document, question)
            .await
            .map_err(|e| self.boundary(document, e))
    }

    async fn list_inner(&self) -> Result<Vec<DocumentStatus>> {
        self.index().ensure_index().await?;

        let names = self.storage_names().await?;
        let mut documents = Vec::with_capacity(names.len());
        for name in names {
            if !DocumentKind::is_supported(&name) {
                debug!("Skipping unsupported file {:?}", name);
                continue;
            }
            let indexed = self.index().exists(&name).await?;
            documents.push(DocumentStatus { name, indexed });
        }
        Ok(documents)
    }

    async fn ingest_inner(&self, document: &str) -> Result<Option<IngestReport>> {
        self.require_listed(document).await?;
        self.index().ensure_index().await?;
        self.ensure_indexed(document).await
    }

    async fn ask_inner(&self, document: &str, question: &str) -> Result<Answer> {
        self.require_listed(document).await?;
        self.index().ensure_index().await?;
        self.ensure_indexed(document).await?;

        let relevant_chunks = self
            .index()
            .query(document, question, self.config.top_k)
            .await?;
        let context = build_context(&relevant_chunks);

        let answer = if context.is_empty() {
            info!("No context retrieved from {:?}, skipping generation", document);
            NO_CONTEXT_ANSWER.to_string()
        } else {
            let prompt = build_prompt(&context, question);
            let request = GenerationRequest {
                system: SYSTEM_INSTRUCTION,
                prompt: &prompt,
                temperature: self.config.temperature,
            };
            self.config
                .call
                .once()
                .run(
                    "generation",
                    || self.generator.generate(&request),
                    GenerateError::Timeout,
                )
                .await?
        };

        debug!(
            "Answered question on {:?} from {} chunks",
            document,
            relevant_chunks.len()
        );
        Ok(Answer {
            query: question.to_string(),
            answer,
            source_document: document.to_string(),
            relevant_chunks,
        })
    }

    async fn storage_names(&self) -> Result<Vec<String>> {
        let storage = self.ingestor.storage();
        // Not `?`: a listing failure is never a missing document
        self.config
            .call
            .run("listing", || storage.list(), StorageError::Timeout)
            .await
            .map_err(Error::Storage)
    }

    async fn require_listed(&self, document: &str) -> Result<()> {
        if self.storage_names().await?.iter().any(|name| name == document) {
            Ok(())
        } else {
            Err(Error::NotFound(document.to_string()))
        }
    }

    /// Ingest the document if it is not indexed yet.
    async fn ensure_indexed(&self, document: &str) -> Result<Option<IngestReport>> {
        if self.index().exists(document).await? {
            debug!("{:?} already indexed", document);
            return Ok(None);
        }

        if !self.config.serialize_ingestion {
            info!("{:?} not indexed, ingesting", document);
            return self.ingestor.ingest(document).await.map(Some);
        }

        let _guard = self.locks.acquire(document).await;
        // Another request may have finished ingesting while we waited
        if self.index().exists(document).await? {
            debug!("{:?} indexed while waiting for lock", document);
            return Ok(None);
        }
        info!("{:?} not indexed, ingesting", document);
        self.ingestor.ingest(document).await.map(Some)
    }

    fn boundary(&self, subject: &str, err: Error) -> Error {
        match err {
            Error::NotFound(name) => {
                warn!("Document not found: {:?}", name);
                Error::NotFound(name)
            }
            other => {
                error!("Request on {:?} failed: {}", subject, other);
                Error::Failed(other.to_string())
            }
        }
    }
}
