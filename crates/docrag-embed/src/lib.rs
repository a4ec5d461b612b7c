//! # docrag-embed
//!
//! Embedding generation for docrag.
//!
//! ## Embedders
//!
//! | Type | Backend | Dimension |
//! |------|---------|-----------|
//! | [`OpenAiEmbedder`] | OpenAI `/embeddings` (`text-embedding-3-small`) | 1536 |
//! | [`HashEmbedder`] | Local feature hashing, no network | configurable |
//!
//! Both implement [`Embedder`](docrag_core::Embedder). The vector index must
//! be created with the dimension of the embedder used to fill it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docrag_embed::{EmbedderPool, OpenAiEmbedder};
//! use std::sync::Arc;
//!
//! let embedder = OpenAiEmbedder::with_defaults(&api_key)?;
//!
//! // Cap concurrent requests to the embedding API
//! let pool = EmbedderPool::new(Arc::new(embedder), 4);
//! let vectors = pool.embed_batch(&["Hello world", "Machine learning"]).await?;
//! ```

pub mod hash;
pub mod openai;
pub mod pool;

pub use hash::HashEmbedder;
pub use openai::OpenAiEmbedder;
pub use pool::EmbedderPool;
