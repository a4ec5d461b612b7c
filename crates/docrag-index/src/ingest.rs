//! Document ingestion: fetch → extract → chunk → embed → upsert.

use docrag_core::{
    CallPolicy, ChunkConfig, Chunker, DocumentKind, FileStorage, Result, StorageError,
};
use docrag_extract::ExtractorRegistry;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::index::DocumentIndex;

/// Summary of one ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Document name
    pub document: String,
    /// Number of chunk records written
    pub chunks: usize,
    /// Whether the text came from the OCR fallback
    pub ocr_used: bool,
}

/// Runs documents from file storage into the vector index.
pub struct Ingestor {
    storage: Arc<dyn FileStorage>,
    extractors: Arc<ExtractorRegistry>,
    chunker: Arc<dyn Chunker>,
    index: Arc<DocumentIndex>,
    chunk_config: ChunkConfig,
    call: CallPolicy,
}

impl Ingestor {
    /// Create a new ingestor.
    pub fn new(
        storage: Arc<dyn FileStorage>,
        extractors: Arc<ExtractorRegistry>,
        chunker: Arc<dyn Chunker>,
        index: Arc<DocumentIndex>,
    ) -> Self {
        Self {
            storage,
            extractors,
            chunker,
            index,
            chunk_config: ChunkConfig::default(),
            call: CallPolicy::default(),
        }
    }

    /// Set the chunking configuration.
    #[must_use]
    pub fn with_chunk_config(mut self, chunk_config: ChunkConfig) -> Self {
        self.chunk_config = chunk_config;
        self
    }

    /// Set the timeout and retry budget for document downloads.
    #[must_use]
    pub fn with_call_policy(mut self, call: CallPolicy) -> Self {
        self.call = call;
        self
    }

    /// The index this ingestor writes to.
    #[must_use]
    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    /// The file storage documents are read from.
    #[must_use]
    pub fn storage(&self) -> &Arc<dyn FileStorage> {
        &self.storage
    }

    /// Ingest one document.
    ///
    /// The format is checked before anything is downloaded. The downloaded
    /// bytes are released as soon as text has been extracted. A document
    /// without any text writes no records.
    pub async fn ingest(&self, name: &str) -> Result<IngestReport> {
        let kind = DocumentKind::from_name(name)?;
        debug!("Ingesting {:?} as {}", name, kind);

        let bytes = self
            .call
            .run("download", || self.storage.fetch(name), StorageError::Timeout)
            .await?;
        debug!("Fetched {:?} ({} bytes)", name, bytes.len());

        let content = self.extractors.get(kind).extract(&bytes).await?;
        drop(bytes);

        if content.is_empty() {
            warn!("No text extracted from {:?}", name);
        }

        let chunks = self.chunker.chunk(&content, &self.chunk_config)?;
        let written = self.index.upsert(name, &chunks).await?;

        info!(
            "Indexed {:?} ({} chunks{})",
            name,
            written,
            if content.ocr_used { ", via OCR" } else { "" }
        );
        Ok(IngestReport {
            document: name.to_string(),
            chunks: written,
            ocr_used: content.ocr_used,
        })
    }
}
