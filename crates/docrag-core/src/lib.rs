//! # docrag-core
//!
//! Core types and traits for docrag, a retrieval-augmented question-answering
//! pipeline over stored documents.
//!
//! This crate provides the foundational abstractions used throughout docrag:
//!
//! - **Text Extraction**: [`TextExtractor`] trait, with [`OcrEngine`] and
//!   [`PageRasterizer`] for the scanned-image fallback
//! - **Chunking**: [`Chunker`] trait for splitting text into retrievable units
//! - **Embedding**: [`Embedder`] trait for converting text to vectors
//! - **Vector Storage**: [`VectorBackend`] trait for namespaced storage and search
//! - **Collaborators**: [`FileStorage`] and [`Generator`] for document download
//!   and answer generation
//!
//! ## Architecture
//!
//! ```text
//! FileStorage -> TextExtractor -> Chunker -> Embedder -> VectorBackend
//!                                                             |
//!                              question -> Embedder -> query -+-> Generator -> Answer
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`DocumentKind`] | Closed set of supported formats |
//! | [`ExtractedText`] | Text extracted from a document, per page or slide |
//! | [`Chunk`] | A bounded span of text with a stable identifier |
//! | [`VectorRecord`] | A vector with its chunk metadata |
//! | [`RetrievedChunk`] | A similarity match handed back to callers |
//! | [`Answer`] | The result of asking a question about a document |
//! | [`CallPolicy`] | Timeout and retry budget for external calls |
//!
//! ## Related Crates
//!
//! - `docrag-extract`: PDF, DOCX, and PPTX extraction with OCR fallback
//! - `docrag-chunker`: Paragraph chunking
//! - `docrag-embed`: OpenAI and deterministic embedders
//! - `docrag-store`: Pinecone and in-memory vector backends
//! - `docrag-storage`: Local and Dropbox file storage
//! - `docrag-index`: Per-document vector index and ingestion
//! - `docrag-query`: Question answering orchestration

pub mod call;
pub mod error;
pub mod traits;
pub mod types;

pub use call::{Backoff, CallPolicy};
pub use error::{
    ChunkError, EmbedError, Error, ExtractError, GenerateError, OcrError, Result, StorageError,
    StoreError,
};
pub use traits::*;
pub use types::*;
