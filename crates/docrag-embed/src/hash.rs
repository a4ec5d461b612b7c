//! Deterministic feature-hashing embedder.
//!
//! This module provides a [`HashEmbedder`] that maps text to vectors without
//! any model or network access. It's useful for:
//! - Running the pipeline offline
//! - Tests that need retrieval to behave sensibly
//!
//! Each lowercase word is hashed with blake3 into a bucket and a sign, and
//! the bucket counts are L2-normalized. Texts that share words therefore
//! have positive cosine similarity.

use async_trait::async_trait;
use docrag_core::{EmbedError, Embedder};

/// Feature-hashing embedder.
///
/// # Example
///
/// ```rust
/// use docrag_embed::HashEmbedder;
/// use docrag_core::Embedder;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let embedder = HashEmbedder::with_dimension(64);
/// let vectors = embedder.embed_text(&["Hello", "World"]).await?;
///
/// assert_eq!(vectors.len(), 2);
/// assert_eq!(vectors[0].len(), 64);
/// # Ok(())
/// # }
/// ```
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create a new hashing embedder with the default index dimension (1536).
    #[must_use]
    pub fn new() -> Self {
        Self { dimension: 1536 }
    }

    /// Create a new hashing embedder with a custom dimension.
    #[must_use]
    pub fn with_dimension(dimension: usize) -> Self {
        Self { dimension }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if self.dimension == 0 {
            return vector;
        }

        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let hash = blake3::hash(word.to_lowercase().as_bytes());
            let bytes = hash.as_bytes();
            let bucket = u64::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
            ]);
            #[allow(clippy::cast_possible_truncation)]
            let index = (bucket % self.dimension as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "feature-hash"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed_text(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}
