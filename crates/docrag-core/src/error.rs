//! Error types for docrag.

use thiserror::Error;

/// Main error type for docrag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// The document is not present in file storage
    #[error("document not found: {0}")]
    NotFound(String),

    /// Text extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractError),

    /// Chunking failed
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkError),

    /// Embedding generation failed
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),

    /// Vector store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// File storage operation failed
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Answer generation failed
    #[error("generation error: {0}")]
    Generation(#[from] GenerateError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),

    /// A query failed somewhere in the pipeline; carries the original message
    #[error("{0}")]
    Failed(String),
}

impl Error {
    /// Whether this error means the document does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => Self::NotFound(name),
            other => Self::Storage(other),
        }
    }
}

/// Text extraction errors.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Failed(String),
}

/// Optical character recognition errors.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The OCR engine could not be started or exited with an error.
    #[error("ocr engine failed: {0}")]
    Engine(String),

    /// Page rasterization failed.
    #[error("rasterization failed: {0}")]
    Rasterize(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Chunking errors.
#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Embedding errors.
#[derive(Error, Debug)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("invalid embedding response: {0}")]
    Response(String),

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding timed out: {0}")]
    Timeout(String),
}

/// Vector store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("index initialization failed: {0}")]
    Init(String),

    #[error("upsert failed: {0}")]
    Insert(String),

    #[error("query failed: {0}")]
    Query(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("vector store timed out: {0}")]
    Timeout(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbedError),
}

/// File storage errors.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("storage request failed: {0}")]
    Request(String),

    #[error("storage timed out: {0}")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Answer generation errors.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("generation request failed: {0}")]
    Request(String),

    #[error("generation returned no choices")]
    EmptyResponse,

    #[error("generation timed out: {0}")]
    Timeout(String),
}

/// Result type alias for docrag operations.
pub type Result<T> = std::result::Result<T, Error>;
