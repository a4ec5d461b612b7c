//! # docrag CLI
//!
//! Ask questions about documents kept in file storage.
//!
//! Documents (PDF, DOCX, PPTX) are listed from Dropbox or a local directory.
//! The first question about a document indexes it into its own namespace of a
//! vector index; later questions reuse that namespace.
//!
//! ## Commands
//!
//! - `docrag documents` - List documents and whether each is indexed
//! - `docrag ingest <DOCUMENT>` - Index a document ahead of time
//! - `docrag ask <DOCUMENT> <QUESTION>` - Answer a question about a document
//! - `docrag config show|init|path` - Inspect configuration
//!
//! ## Examples
//!
//! ```bash
//! # What is stored, and what is indexed?
//! docrag documents
//!
//! # Ask a question
//! docrag ask report.pdf "What was the Q3 revenue?"
//!
//! # Get JSON output
//! docrag ask report.pdf "Who signed it?" --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docrag_chunker::ParagraphChunker;
use docrag_core::{
    Backoff, CallPolicy, ChunkConfig, Embedder, Error, FileStorage, OcrEngine, PageRasterizer,
    VectorBackend,
};
use docrag_embed::{EmbedderPool, HashEmbedder, OpenAiEmbedder};
use docrag_extract::{
    EmbeddedImageRasterizer, ExtractorRegistry, PdftoppmRasterizer, PlaceholderOcr, TesseractOcr,
};
use docrag_index::{DocumentIndex, Ingestor};
use docrag_query::{OpenAiGenerator, QueryService};
use docrag_storage::{DropboxStorage, LocalDirStorage};
use docrag_store::{MemoryBackend, PineconeBackend};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

mod config;

use config::{
    Config, EmbeddingProvider, IndexBackend, OcrKind, RasterizerKind, StorageBackend,
};

#[derive(Parser)]
#[command(name = "docrag")]
#[command(about = "Question answering over documents in file storage")]
#[command(version)]
struct Cli {
    /// Path to config file (default: ~/.config/docrag/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List stored documents and their indexing status
    Documents,

    /// Index a document without asking anything
    Ingest {
        /// Document name, including extension
        document: String,
    },

    /// Answer a question about a document
    Ask {
        /// Document name, including extension
        document: String,

        /// Question to answer
        question: String,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Print sample configuration file
    Init,
    /// Show config file path
    Path,
}

/// Output structure for ingestion.
#[derive(Serialize)]
struct IngestOutput {
    document: String,
    already_indexed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ocr_used: Option<bool>,
}

/// Read a secret from the environment.
fn env_key(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => anyhow::bail!("{name} is not set"),
    }
}

fn create_storage(config: &Config) -> Result<Arc<dyn FileStorage>> {
    let storage: Arc<dyn FileStorage> = match config.storage.backend {
        StorageBackend::Dropbox => Arc::new(
            DropboxStorage::new(&env_key("DROPBOX_ACCESS_TOKEN")?, &config.storage.folder)
                .context("Failed to create Dropbox client")?,
        ),
        StorageBackend::Local => Arc::new(LocalDirStorage::new(&config.storage.root)),
    };
    Ok(storage)
}

fn create_embedder(config: &Config) -> Result<Arc<EmbedderPool>> {
    let embedding = &config.embedding;
    let embedder: Arc<dyn Embedder> = match embedding.provider {
        EmbeddingProvider::OpenAi => Arc::new(
            OpenAiEmbedder::new(
                &env_key("OPENAI_API_KEY")?,
                &embedding.base_url,
                &embedding.model,
                config.index.dimension,
            )
            .context("Failed to create embedding client")?
            .with_backoff(Backoff {
                max_retries: embedding.max_retries,
                ..Backoff::default()
            }),
        ),
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::with_dimension(config.index.dimension)),
    };
    Ok(Arc::new(EmbedderPool::new(embedder, embedding.max_concurrent)))
}

fn create_backend(config: &Config) -> Result<Arc<dyn VectorBackend>> {
    let backend: Arc<dyn VectorBackend> = match config.index.backend {
        IndexBackend::Pinecone => Arc::new(
            PineconeBackend::new(&env_key("PINECONE_API_KEY")?, &config.index.name)
                .context("Failed to create Pinecone client")?,
        ),
        IndexBackend::Memory => Arc::new(MemoryBackend::new()),
    };
    Ok(backend)
}

fn create_extractors(config: &Config) -> Arc<ExtractorRegistry> {
    let extraction = &config.extraction;
    let ocr: Arc<dyn OcrEngine> = match extraction.ocr {
        OcrKind::Tesseract => Arc::new(
            TesseractOcr::new()
                .with_binary(&extraction.tesseract_path)
                .with_language(&extraction.language),
        ),
        OcrKind::Disabled => Arc::new(PlaceholderOcr::new()),
    };
    let rasterizer: Arc<dyn PageRasterizer> = match extraction.rasterizer {
        RasterizerKind::Pdftoppm => Arc::new(
            PdftoppmRasterizer::new()
                .with_binary(&extraction.pdftoppm_path)
                .with_dpi(extraction.dpi),
        ),
        RasterizerKind::Embedded => Arc::new(EmbeddedImageRasterizer::new()),
    };
    Arc::new(ExtractorRegistry::new(ocr, rasterizer))
}

/// Wire up the full pipeline from configuration.
fn create_service(config: &Config) -> Result<QueryService> {
    let call = CallPolicy::new(
        Duration::from_secs(config.query.timeout_secs),
        config.query.retries,
    );

    let index = DocumentIndex::new(
        create_backend(config)?,
        create_embedder(config)?,
        config.index.spec(),
    )
    .with_batch_size(config.index.batch_size)
    .with_status_policy(config.index.status_policy)
    .with_call_policy(call);

    let ingestor = Ingestor::new(
        create_storage(config)?,
        create_extractors(config),
        Arc::new(ParagraphChunker::new()),
        Arc::new(index),
    )
    .with_chunk_config(ChunkConfig {
        chunk_size: config.chunking.chunk_size,
    })
    .with_call_policy(call);

    let generator = OpenAiGenerator::new(
        &env_key("OPENAI_API_KEY")?,
        &config.generation.base_url,
        &config.generation.model,
    )
    .context("Failed to create chat client")?;

    let query_config = docrag_query::QueryConfig {
        top_k: config.query.top_k,
        temperature: config.generation.temperature,
        serialize_ingestion: config.query.serialize_ingestion,
        call,
    };

    debug!(
        "Pipeline: {:?} storage, {:?} index {:?}, {} embeddings",
        config.storage.backend, config.index.backend, config.index.name, config.embedding.model
    );
    Ok(QueryService::new(
        Arc::new(ingestor),
        Arc::new(generator),
        query_config,
    ))
}

/// Turn a pipeline error into a CLI error, keeping "not found" recognizable.
fn cli_error(document: &str, err: Error) -> anyhow::Error {
    if err.is_not_found() {
        anyhow::anyhow!("Document not found: {document}")
    } else {
        anyhow::Error::new(err)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = if let Some(ref path) = cli.config {
        Config::load_from(Some(path.clone()))
            .context(format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load().context("Failed to load config")?
    };

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        config.logging.level.parse().unwrap_or(Level::INFO)
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    match cli.command {
        Commands::Documents => {
            let service = create_service(&config)?;
            let documents = service
                .list_documents()
                .await
                .context("Failed to list documents")?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&documents)?);
                }
                OutputFormat::Text => {
                    if documents.is_empty() {
                        println!("No documents found.");
                    } else {
                        for doc in &documents {
                            let status = if doc.indexed { "indexed" } else { "not indexed" };
                            println!("{:<12} {}", status, doc.name);
                        }
                    }
                }
            }
        }

        Commands::Ingest { document } => {
            let service = create_service(&config)?;
            info!("Ingesting {:?}", document);

            let report = service
                .ingest(&document)
                .await
                .map_err(|e| cli_error(&document, e))?;

            let output = IngestOutput {
                document: document.clone(),
                already_indexed: report.is_none(),
                chunks: report.as_ref().map(|r| r.chunks),
                ocr_used: report.as_ref().map(|r| r.ocr_used),
            };

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&output)?);
                }
                OutputFormat::Text => match report {
                    None => println!("{document} is already indexed."),
                    Some(report) => println!(
                        "Indexed {} ({} chunks{})",
                        report.document,
                        report.chunks,
                        if report.ocr_used { ", via OCR" } else { "" }
                    ),
                },
            }
        }

        Commands::Ask { document, question } => {
            let service = create_service(&config)?;

            let answer = service
                .ask(&document, &question)
                .await
                .map_err(|e| cli_error(&document, e))?;

            match cli.format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&answer)?);
                }
                OutputFormat::Text => {
                    println!("Q: {}\n", answer.query);
                    println!("{}\n", answer.answer);
                    if !answer.relevant_chunks.is_empty() {
                        println!("Sources from {}:", answer.source_document);
                        for (i, chunk) in answer.relevant_chunks.iter().enumerate() {
                            let page = chunk
                                .page
                                .map(|p| format!(" page {p}"))
                                .unwrap_or_default();
                            println!("{}.{} (score: {:.3})", i + 1, page, chunk.score);
                            println!("   {}", truncate(&chunk.text, 200));
                        }
                    }
                }
            }
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&config)
                            .context("Failed to serialize config")?
                    );
                }
                OutputFormat::Text => {
                    println!(
                        "{}",
                        toml::to_string_pretty(&config).context("Failed to serialize config")?
                    );
                }
            },
            ConfigAction::Init => {
                println!("{}", Config::sample_toml());
            }
            ConfigAction::Path => {
                if let Some(path) = Config::config_path() {
                    println!("{}", path.display());
                } else {
                    println!("Could not determine config directory");
                }
            }
        },
    }

    Ok(())
}

/// Truncate a string to max length, adding ellipsis if needed.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.replace('\n', " ").replace('\r', "");
    if s.chars().count() <= max_len {
        s
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}
