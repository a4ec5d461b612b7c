//! Core types for docrag.
//!
//! ## Documents
//! - [`DocumentKind`]: The closed set of formats the extractor understands
//! - [`DocumentStatus`]: A stored document and whether it is indexed
//!
//! ## Extraction
//! - [`ExtractedText`]: Plain text extracted from a document, split into units
//! - [`TextUnit`]: One page, slide, or whole-document body of text
//!
//! ## Chunks
//! - [`Chunk`]: A bounded span of extracted text with a stable identifier
//! - [`ChunkConfig`]: Configuration for chunking behavior
//!
//! ## Vector Index
//! - [`IndexSpec`]: Name, dimension, and metric of the vector index
//! - [`VectorRecord`]: The persisted unit in a document namespace
//! - [`QueryMatch`]: A raw match returned by a vector backend
//! - [`RetrievedChunk`]: A query result handed to the caller
//!
//! ## Answers
//! - [`Answer`]: The output of a question about a document

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::ExtractError;

// ============================================================================
// Documents
// ============================================================================

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Pdf,
    Docx,
    Pptx,
}

impl DocumentKind {
    /// Every supported kind.
    pub const ALL: [Self; 3] = [Self::Pdf, Self::Docx, Self::Pptx];

    /// Classify a document by the extension of its name.
    pub fn from_name(name: &str) -> Result<Self, ExtractError> {
        let ext = Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" => Ok(Self::Docx),
            "pptx" => Ok(Self::Pptx),
            _ => Err(ExtractError::UnsupportedFormat(name.to_string())),
        }
    }

    /// Whether the name carries a supported extension.
    #[must_use]
    pub fn is_supported(name: &str) -> bool {
        Self::from_name(name).is_ok()
    }

    /// Canonical file extension.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Pptx => "pptx",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A stored document and its derived indexing status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentStatus {
    /// Document name, including extension
    pub name: String,
    /// Whether the document's namespace is considered indexed
    pub indexed: bool,
}

// ============================================================================
// Extraction
// ============================================================================

/// A unit of extracted text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextUnit {
    /// Page or slide number (1-indexed), when the format has page boundaries
    pub page: Option<u32>,
    /// Text of the unit, trimmed
    pub text: String,
}

/// Text extracted from a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    /// Units in document order
    pub units: Vec<TextUnit>,
    /// Whether the OCR fallback produced this text
    pub ocr_used: bool,
}

impl ExtractedText {
    /// Create an empty extraction result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a unit. Whitespace-only text contributes nothing, and text for
    /// the same page as the previous unit is merged into it.
    pub fn push(&mut self, page: Option<u32>, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.units.last_mut() {
            if last.page == page {
                last.text.push('\n');
                last.text.push_str(text);
                return;
            }
        }
        self.units.push(TextUnit {
            page,
            text: text.to_string(),
        });
    }

    /// Whether no non-whitespace text was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Whether the units carry page numbers.
    #[must_use]
    pub fn has_pages(&self) -> bool {
        self.units.iter().any(|unit| unit.page.is_some())
    }

    /// The full corpus: all units joined by a newline.
    #[must_use]
    pub fn text(&self) -> String {
        self.units
            .iter()
            .map(|unit| unit.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Chunking
// ============================================================================

/// Configuration for chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Soft cap on chunk length, in characters
    pub chunk_size: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self { chunk_size: 1000 }
    }
}

/// A chunk of document text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier unique within the document (`chunk_<k>` or `page_<n>_chunk_<k>`)
    pub id: String,
    /// Chunk text; paragraphs are joined by a blank line
    pub text: String,
    /// Source page, when extraction preserved page boundaries
    pub page: Option<u32>,
}

// ============================================================================
// Vector Index
// ============================================================================

/// Distance metric for vector search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    #[serde(rename = "dotproduct")]
    DotProduct,
}

impl DistanceMetric {
    /// Wire name of the metric.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dotproduct",
        }
    }
}

/// Description of the vector index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name
    pub name: String,
    /// Embedding dimension
    pub dimension: usize,
    /// Similarity metric
    pub metric: DistanceMetric,
    /// Cloud provider hosting a serverless index
    pub cloud: String,
    /// Cloud region hosting a serverless index
    pub region: String,
}

impl Default for IndexSpec {
    fn default() -> Self {
        Self {
            name: "dropbox-rag".to_string(),
            dimension: 1536,
            metric: DistanceMetric::Cosine,
            cloud: "aws".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}

/// Outcome of an index creation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexCreation {
    Created,
    AlreadyExists,
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Chunk text
    pub text: String,
    /// Owning document name
    pub document: String,
    /// Chunk identifier within the document
    pub chunk_id: String,
    /// Source page, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// The persisted unit in a document namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Record id, derived from document name and chunk id
    pub id: String,
    /// Embedding vector
    pub values: Vec<f32>,
    /// Record metadata
    pub metadata: RecordMetadata,
}

/// A match returned by a vector backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryMatch {
    /// Record id
    pub id: String,
    /// Similarity score
    pub score: f32,
    /// Record metadata
    pub metadata: RecordMetadata,
}

/// A retrieved chunk, ordered by descending score in query results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// Chunk text
    pub text: String,
    /// Source page, if known
    pub page: Option<u32>,
    /// Similarity score
    pub score: f32,
}

impl From<QueryMatch> for RetrievedChunk {
    fn from(m: QueryMatch) -> Self {
        Self {
            text: m.metadata.text,
            page: m.metadata.page,
            score: m.score,
        }
    }
}

// ============================================================================
// Answers
// ============================================================================

/// Answer to a question about a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// The question as asked
    pub query: String,
    /// Generated answer text
    pub answer: String,
    /// Name of the document the answer is drawn from
    pub source_document: String,
    /// Retrieved chunks used as context
    pub relevant_chunks: Vec<RetrievedChunk>,
}
