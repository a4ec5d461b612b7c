//! Vector storage layer for docrag.
//!
//! This crate provides the backends behind the
//! [`VectorBackend`](docrag_core::VectorBackend) trait. Every document gets
//! its own namespace inside one shared index, so retrieval for a document
//! never sees another document's chunks.
//!
//! # Backends
//!
//! - [`PineconeBackend`]: a Pinecone serverless index over REST
//! - [`MemoryBackend`]: brute-force search in memory, for offline runs and tests
//!
//! # Example
//!
//! ```rust,ignore
//! use docrag_store::PineconeBackend;
//! use docrag_core::{IndexSpec, VectorBackend};
//!
//! let backend = PineconeBackend::new(&api_key, "dropbox-rag")?;
//! backend.create_index(&IndexSpec::default()).await?;
//!
//! let matches = backend.query("report.pdf", &query_vector, 3).await?;
//! ```

pub mod memory;
pub mod pinecone;

pub use memory::MemoryBackend;
pub use pinecone::PineconeBackend;
