//! Document indexing for docrag.
//!
//! This crate keeps the vector index in step with file storage:
//! fetch → extraction → chunking → embedding → upsert.
//!
//! # Components
//!
//! - [`DocumentIndex`]: One namespace per document; existence checks, batched
//!   upserts, and similarity queries
//! - [`Ingestor`]: Runs a stored document through the whole pipeline
//! - [`IndexStatusPolicy`]: How "is this document indexed" is decided
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag_index::{DocumentIndex, Ingestor};
//!
//! let index = Arc::new(DocumentIndex::new(backend, embedder, IndexSpec::default()));
//! index.ensure_index().await?;
//!
//! let ingestor = Ingestor::new(storage, extractors, chunker, Arc::clone(&index));
//! if !index.exists("report.pdf").await? {
//!     ingestor.ingest("report.pdf").await?;
//! }
//!
//! let chunks = index.query("report.pdf", "What changed in Q3?", 3).await?;
//! ```

pub mod index;
pub mod ingest;

pub use index::{marker_id, record_id, DocumentIndex, IndexStatusPolicy, DEFAULT_BATCH_SIZE};
pub use ingest::{IngestReport, Ingestor};
