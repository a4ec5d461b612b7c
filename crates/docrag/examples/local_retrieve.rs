//! Offline example: index one local document and show what retrieval finds.
//!
//! Uses the in-memory vector backend and hashed embeddings, so no API keys
//! are needed. Scanned pages get no OCR here.
//!
//! Run with:
//! ```bash
//! cargo run --example local_retrieve -- /path/to/documents report.pdf "your question"
//! ```

use anyhow::Result;
use docrag_chunker::ParagraphChunker;
use docrag_core::IndexSpec;
use docrag_embed::{EmbedderPool, HashEmbedder};
use docrag_extract::{EmbeddedImageRasterizer, ExtractorRegistry, PlaceholderOcr};
use docrag_index::{DocumentIndex, Ingestor};
use docrag_storage::LocalDirStorage;
use docrag_store::MemoryBackend;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const TOP_K: usize = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <directory> <document> <question>", args[0]);
        eprintln!("\nExample:");
        eprintln!("  {} ./docs report.pdf \"What was the Q3 revenue?\"", args[0]);
        std::process::exit(1);
    }

    let root = PathBuf::from(&args[1]);
    let document = &args[2];
    let question = &args[3];

    if !root.is_dir() {
        anyhow::bail!("Directory does not exist: {:?}", root);
    }

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let spec = IndexSpec::default();
    let embedder = Arc::new(EmbedderPool::new(
        Arc::new(HashEmbedder::with_dimension(spec.dimension)),
        4,
    ));
    let index = Arc::new(DocumentIndex::new(
        Arc::new(MemoryBackend::new()),
        embedder,
        spec,
    ));
    index.ensure_index().await?;

    let ingestor = Ingestor::new(
        Arc::new(LocalDirStorage::new(root)),
        Arc::new(ExtractorRegistry::new(
            Arc::new(PlaceholderOcr::new()),
            Arc::new(EmbeddedImageRasterizer::new()),
        )),
        Arc::new(ParagraphChunker::new()),
        index.clone(),
    );

    let report = ingestor.ingest(document).await?;
    info!("Indexed {} chunks from {:?}", report.chunks, document);

    let chunks = index.query(document, question, TOP_K).await?;
    if chunks.is_empty() {
        println!("Nothing retrieved.");
        return Ok(());
    }

    println!("Question: {question}\n");
    for (i, chunk) in chunks.iter().enumerate() {
        let page = chunk.page.map(|p| format!(" page {p}")).unwrap_or_default();
        println!("{}.{} (score: {:.3})", i + 1, page, chunk.score);
        println!("{}\n", chunk.text);
    }

    Ok(())
}
