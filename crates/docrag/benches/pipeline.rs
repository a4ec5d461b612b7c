//! Benchmarks for chunking and per-document retrieval.
//!
//! Retrieval runs against the in-memory backend with hashed embeddings, so it
//! measures the pipeline's own overhead rather than network latency.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use docrag_chunker::ParagraphChunker;
use docrag_core::{Chunk, ChunkConfig, Chunker, ExtractedText, IndexSpec};
use docrag_embed::{EmbedderPool, HashEmbedder};
use docrag_index::DocumentIndex;
use docrag_store::MemoryBackend;
use std::sync::Arc;

const EMBEDDING_DIM: usize = 256;

/// Build extracted text with `pages` pages of a few paragraphs each.
fn create_document(pages: u32) -> ExtractedText {
    let mut content = ExtractedText::new();
    for page in 1..=pages {
        let text = (0..5)
            .map(|p| {
                format!(
                    "Paragraph {p} on page {page} discusses revenue, headcount and the \
                     roadmap for the coming quarter in some detail."
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        content.push(Some(page), &text);
    }
    content
}

fn chunking_benchmark(c: &mut Criterion) {
    let chunker = ParagraphChunker::new();
    let mut group = c.benchmark_group("chunking");

    for pages in &[10u32, 100, 1_000] {
        let content = create_document(*pages);
        group.throughput(Throughput::Bytes(content.text().len() as u64));

        for chunk_size in &[200usize, 1_000] {
            let config = ChunkConfig {
                chunk_size: *chunk_size,
            };
            group.bench_with_input(
                BenchmarkId::new(format!("paragraph_{chunk_size}"), format!("{pages}_pages")),
                &content,
                |b, content| {
                    b.iter(|| black_box(chunker.chunk(content, &config)));
                },
            );
        }
    }

    group.finish();
}

fn retrieval_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let chunker = ParagraphChunker::new();
    let mut group = c.benchmark_group("retrieval");

    for pages in &[10u32, 100, 1_000] {
        // Skip large benchmarks in CI
        if *pages > 100 && std::env::var("CI").is_ok() {
            continue;
        }

        let chunks: Vec<Chunk> = chunker
            .chunk(&create_document(*pages), &ChunkConfig { chunk_size: 300 })
            .unwrap();

        let index = Arc::new(DocumentIndex::new(
            Arc::new(MemoryBackend::new()),
            Arc::new(EmbedderPool::new(
                Arc::new(HashEmbedder::with_dimension(EMBEDDING_DIM)),
                4,
            )),
            IndexSpec {
                dimension: EMBEDDING_DIM,
                ..IndexSpec::default()
            },
        ));

        rt.block_on(async {
            index.ensure_index().await.unwrap();
            index.upsert("bench.pdf", &chunks).await.unwrap();
        });

        group.bench_with_input(
            BenchmarkId::new("top_3", format!("{}_chunks", chunks.len())),
            &index,
            |b, index| {
                b.to_async(&rt).iter(|| async {
                    black_box(
                        index
                            .query("bench.pdf", "what is on the roadmap?", 3)
                            .await,
                    )
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, chunking_benchmark, retrieval_benchmark);
criterion_main!(benches);
