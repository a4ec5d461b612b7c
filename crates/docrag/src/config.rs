//! Configuration handling for docrag.
//!
//! Settings come from a TOML file; every field has a default, so a missing
//! file or section is fine. API keys are never read from the file, only from
//! the environment.

use directories::ProjectDirs;
use docrag_core::{DistanceMetric, Error, IndexSpec};
use docrag_index::IndexStatusPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    /// Where documents are read from
    #[serde(default)]
    pub storage: StorageConfig,

    /// Vector index configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Answer generation configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Chunking configuration
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Query configuration
    #[serde(default)]
    pub query: QueryConfig,

    /// Text extraction configuration
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Path of the default config file.
    pub fn config_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Load the default config file, or defaults if it does not exist.
    pub fn load() -> Result<Self, Error> {
        Self::load_from(None)
    }

    /// Load `path`, or the default config file when `path` is `None`.
    ///
    /// An explicitly given file must exist; a missing default file yields the
    /// default configuration.
    pub fn load_from(path: Option<PathBuf>) -> Result<Self, Error> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => match Self::config_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !required && !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// A commented sample configuration file with every default spelled out.
    pub fn sample_toml() -> &'static str {
        SAMPLE_TOML
    }
}

/// Document storage backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// A Dropbox folder; needs `DROPBOX_ACCESS_TOKEN`
    #[default]
    Dropbox,
    /// Files in a local directory
    Local,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory served by the local backend
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Dropbox folder ("" is the app root)
    #[serde(default)]
    pub folder: String,
}

fn default_root() -> PathBuf {
    data_dir()
        .map(|dir| dir.join("documents"))
        .unwrap_or_else(|| PathBuf::from("documents"))
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            root: default_root(),
            folder: String::new(),
        }
    }
}

/// Vector store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Pinecone serverless; needs `PINECONE_API_KEY`
    #[default]
    Pinecone,
    /// In-process memory, lost on exit
    Memory,
}

/// Index-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Vector store backend
    #[serde(default)]
    pub backend: IndexBackend,

    /// Index name
    #[serde(default = "default_index_name")]
    pub name: String,

    /// Embedding dimension
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Similarity metric
    #[serde(default)]
    pub metric: DistanceMetric,

    /// Serverless cloud
    #[serde(default = "default_cloud")]
    pub cloud: String,

    /// Serverless region
    #[serde(default = "default_region")]
    pub region: String,

    /// Records per upsert call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// How indexing status is derived
    #[serde(default)]
    pub status_policy: IndexStatusPolicy,
}

fn default_index_name() -> String {
    "dropbox-rag".to_string()
}

fn default_dimension() -> usize {
    1536
}

fn default_cloud() -> String {
    "aws".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_batch_size() -> usize {
    100
}

impl IndexConfig {
    /// The index description handed to the backend.
    pub fn spec(&self) -> IndexSpec {
        IndexSpec {
            name: self.name.clone(),
            dimension: self.dimension,
            metric: self.metric,
            cloud: self.cloud.clone(),
            region: self.region.clone(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::default(),
            name: default_index_name(),
            dimension: default_dimension(),
            metric: DistanceMetric::default(),
            cloud: default_cloud(),
            region: default_region(),
            batch_size: default_batch_size(),
            status_policy: IndexStatusPolicy::default(),
        }
    }
}

/// Embedding provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// OpenAI embeddings; needs `OPENAI_API_KEY`
    #[default]
    OpenAi,
    /// Local feature hashing, for offline runs
    Hash,
}

/// Embedding-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding provider
    #[serde(default)]
    pub provider: EmbeddingProvider,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// API root
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// Max concurrent embedding requests
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Retries for rate limiting and server errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::default(),
            model: default_embedding_model(),
            base_url: default_openai_url(),
            max_concurrent: default_max_concurrent(),
            max_retries: default_max_retries(),
        }
    }
}

/// Generation-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Chat model
    #[serde(default = "default_chat_model")]
    pub model: String,

    /// API root
    #[serde(default = "default_openai_url")]
    pub base_url: String,

    /// Sampling temperature
    #[serde(default)]
    pub temperature: f32,
}

fn default_chat_model() -> String {
    "gpt-3.5-turbo".to_string()
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_chat_model(),
            base_url: default_openai_url(),
            temperature: 0.0,
        }
    }
}

/// Chunking-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Soft cap on chunk length (characters)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_chunk_size() -> usize {
    1000
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
        }
    }
}

/// Query-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Deadline for each external call (seconds)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after a timeout, for idempotent calls
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Serialize first-time ingestion per document
    #[serde(default = "default_serialize_ingestion")]
    pub serialize_ingestion: bool,
}

fn default_top_k() -> usize {
    3
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retries() -> u32 {
    2
}

fn default_serialize_ingestion() -> bool {
    true
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
            serialize_ingestion: default_serialize_ingestion(),
        }
    }
}

/// How scanned PDF pages become images.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerKind {
    /// Render pages with poppler's `pdftoppm`
    #[default]
    Pdftoppm,
    /// Decode the largest image embedded in each page
    Embedded,
}

/// OCR engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OcrKind {
    /// The `tesseract` command
    #[default]
    Tesseract,
    /// No OCR; scanned documents yield no text
    Disabled,
}

/// Extraction-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// OCR engine
    #[serde(default)]
    pub ocr: OcrKind,

    /// PDF page rasterizer
    #[serde(default)]
    pub rasterizer: RasterizerKind,

    /// Tesseract language
    #[serde(default = "default_language")]
    pub language: String,

    /// Rendering resolution for `pdftoppm`
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Path to `tesseract`
    #[serde(default = "default_tesseract_path")]
    pub tesseract_path: PathBuf,

    /// Path to `pdftoppm`
    #[serde(default = "default_pdftoppm_path")]
    pub pdftoppm_path: PathBuf,
}

fn default_language() -> String {
    "eng".to_string()
}

fn default_dpi() -> u32 {
    200
}

fn default_tesseract_path() -> PathBuf {
    PathBuf::from("tesseract")
}

fn default_pdftoppm_path() -> PathBuf {
    PathBuf::from("pdftoppm")
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            ocr: OcrKind::default(),
            rasterizer: RasterizerKind::default(),
            language: default_language(),
            dpi: default_dpi(),
            tesseract_path: default_tesseract_path(),
            pdftoppm_path: default_pdftoppm_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Get the XDG data directory for docrag.
pub fn data_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DOCRAG_DATA_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "docrag").map(|dirs| dirs.data_dir().to_path_buf())
}

/// Get the XDG config directory for docrag.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("DOCRAG_CONFIG_DIR") {
        return Some(PathBuf::from(dir));
    }

    ProjectDirs::from("", "", "docrag").map(|dirs| dirs.config_dir().to_path_buf())
}

const SAMPLE_TOML: &str = r#"# docrag configuration
#
# API keys are read from the environment (or a .env file), never from here:
#   OPENAI_API_KEY, PINECONE_API_KEY, DROPBOX_ACCESS_TOKEN

[storage]
# "dropbox" or "local"
backend = "dropbox"
# Dropbox folder; "" is the app root
folder = ""
# Directory used by the local backend
# root = "/path/to/documents"

[index]
# "pinecone" or "memory"
backend = "pinecone"
name = "dropbox-rag"
dimension = 1536
metric = "cosine"
cloud = "aws"
region = "us-east-1"
batch_size = 100
# "any_record": indexed once the namespace holds any vector
# "completion_marker": indexed once every batch has been written
status_policy = "any_record"

[embedding]
# "openai" or "hash" (offline, for testing)
provider = "openai"
model = "text-embedding-3-small"
base_url = "https://api.openai.com/v1"
max_concurrent = 4
max_retries = 3

[generation]
model = "gpt-3.5-turbo"
base_url = "https://api.openai.com/v1"
temperature = 0.0

[chunking]
chunk_size = 1000

[query]
top_k = 3
timeout_secs = 60
retries = 2
serialize_ingestion = true

[extraction]
# "tesseract" or "disabled"
ocr = "tesseract"
# "pdftoppm" or "embedded"
rasterizer = "pdftoppm"
language = "eng"
dpi = 200
tesseract_path = "tesseract"
pdftoppm_path = "pdftoppm"

[logging]
level = "info"
"#;
