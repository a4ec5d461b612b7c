//! Core traits for docrag components.
//!
//! This module defines the seams of the pipeline:
//!
//! - [`TextExtractor`]: Extract plain text from document bytes
//! - [`OcrEngine`] and [`PageRasterizer`]: The scanned-image fallback
//! - [`Chunker`]: Split extracted text into chunks
//! - [`Embedder`]: Generate vector embeddings
//! - [`VectorBackend`]: Namespaced vector storage and search
//! - [`FileStorage`]: Remote document listing and download
//! - [`Generator`]: Language-model completion
//!
//! Every external collaborator sits behind one of these traits, so tests can
//! substitute deterministic fakes.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::{
    ChunkError, EmbedError, ExtractError, GenerateError, OcrError, StorageError, StoreError,
};
use crate::types::{
    Chunk, ChunkConfig, DocumentKind, ExtractedText, IndexCreation, IndexSpec, QueryMatch,
    VectorRecord,
};

// ============================================================================
// Text Extraction
// ============================================================================

/// Trait for extracting plain text from a document of one format.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// The format this extractor handles.
    fn kind(&self) -> DocumentKind;

    /// Extract text from document bytes.
    ///
    /// Per-page and per-image failures are logged and skipped; a document
    /// with no recoverable text yields an empty [`ExtractedText`].
    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError>;
}

/// Trait for optical character recognition over an image file.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Engine name.
    fn name(&self) -> &str;

    /// Recognize text in the image at `image`.
    async fn recognize(&self, image: &Path) -> Result<String, OcrError>;
}

/// A rasterized PDF page written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// Page number (1-indexed)
    pub page: u32,
    /// Path of the image inside the caller's scratch directory
    pub path: PathBuf,
}

/// Trait for turning PDF pages into images for OCR.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Rasterizer name.
    fn name(&self) -> &str;

    /// Render every page of `pdf` into `workdir`, in page order.
    async fn rasterize(&self, pdf: &[u8], workdir: &Path) -> Result<Vec<PageImage>, OcrError>;
}

// ============================================================================
// Chunking
// ============================================================================

/// Trait for splitting extracted text into chunks.
pub trait Chunker: Send + Sync {
    /// Name of this chunking strategy.
    fn name(&self) -> &str;

    /// Chunk the extracted text.
    fn chunk(&self, content: &ExtractedText, config: &ChunkConfig)
        -> Result<Vec<Chunk>, ChunkError>;
}

// ============================================================================
// Embedding
// ============================================================================

/// Trait for generating embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Embedding dimension.
    fn dimension(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embed a single query.
    async fn embed_query(&self, query: &str) -> Result<Vec<f32>, EmbedError> {
        let results = self.embed_text(&[query]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Response("empty embedding result".to_string()))
    }
}

// ============================================================================
// Vector Storage
// ============================================================================

/// Trait for a vector store bound to a single index.
///
/// All record operations are scoped to a namespace; records in one namespace
/// are never visible from another.
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Create the index if it does not exist yet.
    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexCreation, StoreError>;

    /// Number of records currently in `namespace`.
    async fn namespace_count(&self, namespace: &str) -> Result<u64, StoreError>;

    /// Insert or overwrite records by id.
    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<(), StoreError>;

    /// Top-`top_k` records by similarity, ordered by descending score.
    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, StoreError>;

    /// The subset of `ids` present in `namespace`.
    async fn fetch_ids(&self, namespace: &str, ids: &[String]) -> Result<Vec<String>, StoreError>;
}

// ============================================================================
// File Storage
// ============================================================================

/// Trait for the remote store holding source documents.
#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Storage name.
    fn name(&self) -> &str;

    /// Names of all stored documents.
    async fn list(&self) -> Result<Vec<String>, StorageError>;

    /// Download a document. Fails with [`StorageError::NotFound`] if absent.
    async fn fetch(&self, name: &str) -> Result<Vec<u8>, StorageError>;
}

// ============================================================================
// Generation
// ============================================================================

/// A completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationRequest<'a> {
    /// System instructions
    pub system: &'a str,
    /// User prompt
    pub prompt: &'a str,
    /// Sampling temperature
    pub temperature: f32,
}

/// Trait for language-model completion.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Model name/identifier.
    fn model_name(&self) -> &str;

    /// Generate a completion, returned verbatim.
    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerateError>;
}
