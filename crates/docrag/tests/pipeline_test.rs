//! Integration tests for the full docrag pipeline.
//!
//! Tests the complete flow: list → fetch → extract → chunk → embed → upsert →
//! retrieve → generate, against local storage and the in-memory backend.

use async_trait::async_trait;
use docrag_chunker::ParagraphChunker;
use docrag_core::{
    Embedder, Error, GenerateError, GenerationRequest, Generator, IndexCreation, IndexSpec,
    QueryMatch, StoreError, VectorBackend, VectorRecord,
};
use docrag_embed::{EmbedderPool, HashEmbedder};
use docrag_extract::fixtures::{self, CountingOcr, FakeRasterizer, Slide};
use docrag_extract::ExtractorRegistry;
use docrag_index::{DocumentIndex, IndexStatusPolicy, Ingestor};
use docrag_query::{QueryConfig, QueryService, NO_CONTEXT_ANSWER};
use docrag_storage::LocalDirStorage;
use docrag_store::MemoryBackend;
use futures::future::join_all;
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const TEST_DIM: usize = 128;

// ==================== Fakes ====================

/// Generator that echoes how much context it was given.
struct EchoGenerator {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl EchoGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for EchoGenerator {
    fn model_name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: &GenerationRequest<'_>) -> Result<String, GenerateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.prompt.to_string());
        Ok(format!("answered from {} bytes of prompt", request.prompt.len()))
    }
}

/// Backend that can be told to fail every upsert after the first `n`.
struct FlakyBackend {
    inner: MemoryBackend,
    upserts: AtomicUsize,
    fail_after: AtomicUsize,
    failing: AtomicBool,
}

impl FlakyBackend {
    fn new(inner: MemoryBackend) -> Self {
        Self {
            inner,
            upserts: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
            failing: AtomicBool::new(false),
        }
    }

    fn fail_after(&self, n: usize) {
        self.upserts.store(0, Ordering::SeqCst);
        self.fail_after.store(n, Ordering::SeqCst);
        self.failing.store(true, Ordering::SeqCst);
    }

    fn heal(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl VectorBackend for FlakyBackend {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn create_index(&self, spec: &IndexSpec) -> Result<IndexCreation, StoreError> {
        self.inner.create_index(spec).await
    }

    async fn namespace_count(&self, namespace: &str) -> Result<u64, StoreError> {
        self.inner.namespace_count(namespace).await
    }

    async fn upsert(&self, namespace: &str, records: &[VectorRecord]) -> Result<(), StoreError> {
        let done = self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) && done >= self.fail_after.load(Ordering::SeqCst) {
            return Err(StoreError::Insert("connection reset".to_string()));
        }
        self.inner.upsert(namespace, records).await
    }

    async fn query(
        &self,
        namespace: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        self.inner.query(namespace, vector, top_k).await
    }

    async fn fetch_ids(&self, namespace: &str, ids: &[String]) -> Result<Vec<String>, StoreError> {
        self.inner.fetch_ids(namespace, ids).await
    }
}

// ==================== Harness ====================

struct Pipeline {
    dir: TempDir,
    memory: MemoryBackend,
    backend: Arc<FlakyBackend>,
    ocr: Arc<CountingOcr>,
    generator: Arc<EchoGenerator>,
    service: QueryService,
}

struct Options {
    ocr_text: &'static str,
    scanned_pages: u32,
    batch_size: usize,
    policy: IndexStatusPolicy,
    serialize_ingestion: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            ocr_text: "",
            scanned_pages: 1,
            batch_size: 100,
            policy: IndexStatusPolicy::AnyRecord,
            serialize_ingestion: true,
        }
    }
}

fn pipeline(options: Options) -> Pipeline {
    let dir = tempfile::tempdir().unwrap();
    let memory = MemoryBackend::new();
    let backend = Arc::new(FlakyBackend::new(memory.clone()));
    let ocr = Arc::new(CountingOcr::new(options.ocr_text));
    let generator = Arc::new(EchoGenerator::new());

    let index = DocumentIndex::new(
        backend.clone(),
        Arc::new(EmbedderPool::new(
            Arc::new(HashEmbedder::with_dimension(TEST_DIM)),
            2,
        )),
        IndexSpec {
            dimension: TEST_DIM,
            ..IndexSpec::default()
        },
    )
    .with_batch_size(options.batch_size)
    .with_status_policy(options.policy);

    let ingestor = Ingestor::new(
        Arc::new(LocalDirStorage::new(dir.path())),
        Arc::new(ExtractorRegistry::new(
            ocr.clone(),
            Arc::new(FakeRasterizer::new(options.scanned_pages)),
        )),
        Arc::new(ParagraphChunker::new()),
        Arc::new(index),
    );

    let service = QueryService::new(
        Arc::new(ingestor),
        generator.clone(),
        QueryConfig {
            serialize_ingestion: options.serialize_ingestion,
            ..QueryConfig::default()
        },
    );

    Pipeline {
        dir,
        memory,
        backend,
        ocr,
        generator,
        service,
    }
}

impl Pipeline {
    fn put(&self, name: &str, bytes: &[u8]) {
        std::fs::write(self.dir.path().join(name), bytes).unwrap();
    }

    async fn indexed(&self, name: &str) -> bool {
        self.service
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| d.indexed)
            .unwrap()
    }

    async fn record_ids(&self, name: &str) -> Vec<String> {
        self.memory
            .records(name)
            .await
            .into_iter()
            .map(|r| r.id)
            .collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (na * nb)
}

// ========== End-to-end Tests ==========

#[tokio::test]
async fn test_three_paragraphs_fit_one_chunk() {
    let p = pipeline(Options::default());
    p.put(
        "minutes.docx",
        &fixtures::docx_with_paragraphs(
            &[
                "The board met on Tuesday.",
                "Revenue was discussed at length.",
                "The meeting closed at noon.",
            ],
            &[],
        ),
    );

    let question = "When did the meeting close?";
    let answer = p.service.ask("minutes.docx", question).await.unwrap();

    assert_eq!(p.record_ids("minutes.docx").await, vec!["minutes.docx_chunk_1"]);
    assert_eq!(answer.relevant_chunks.len(), 1);

    let chunk = &answer.relevant_chunks[0];
    assert_eq!(
        chunk.text,
        "The board met on Tuesday.\n\nRevenue was discussed at length.\n\nThe meeting closed at noon."
    );
    assert_eq!(chunk.page, None);

    let embedder = HashEmbedder::with_dimension(TEST_DIM);
    let expected = cosine(
        &embedder.embed_query(&chunk.text).await.unwrap(),
        &embedder.embed_query(question).await.unwrap(),
    );
    assert!((chunk.score - expected).abs() < 1e-4);
    assert_eq!(p.generator.calls(), 1);
}

#[tokio::test]
async fn test_three_paragraph_pdf_fits_one_page_chunk() {
    let p = pipeline(Options::default());
    p.put(
        "minutes.pdf",
        &fixtures::pdf_with_pages(&[
            "The board met on Tuesday.\nRevenue was discussed at length.\nThe meeting closed at noon.",
        ]),
    );

    let answer = p
        .service
        .ask("minutes.pdf", "When did the meeting close?")
        .await
        .unwrap();

    assert_eq!(p.record_ids("minutes.pdf").await, vec!["minutes.pdf_page_1_chunk_1"]);
    assert_eq!(answer.relevant_chunks.len(), 1);
    assert_eq!(
        answer.relevant_chunks[0].text,
        "The board met on Tuesday.\n\nRevenue was discussed at length.\n\nThe meeting closed at noon."
    );
    assert_eq!(answer.relevant_chunks[0].page, Some(1));
    assert_eq!(p.ocr.calls(), 0);
    assert_eq!(p.generator.calls(), 1);
}

#[tokio::test]
async fn test_missing_document_is_not_found_without_extraction() {
    let p = pipeline(Options::default());
    p.put("present.pdf", &fixtures::pdf_with_pages(&["here"]));

    let err = p.service.ask("absent.pdf", "anything?").await.unwrap_err();

    assert!(matches!(err, Error::NotFound(ref name) if name == "absent.pdf"));
    assert_eq!(p.ocr.calls(), 0);
    assert_eq!(p.memory.namespace_count("absent.pdf").await.unwrap(), 0);
    assert_eq!(p.generator.calls(), 0);
}

#[tokio::test]
async fn test_no_text_anywhere_short_circuits() {
    let p = pipeline(Options::default());
    p.put("scan.pdf", &fixtures::pdf_with_pages(&["", ""]));

    let answer = p.service.ask("scan.pdf", "What does it say?").await.unwrap();

    assert_eq!(answer.answer, NO_CONTEXT_ANSWER);
    assert!(answer.relevant_chunks.is_empty());
    assert_eq!(p.generator.calls(), 0);
    assert!(!p.indexed("scan.pdf").await);
}

#[tokio::test]
async fn test_concurrent_first_queries_without_lock_converge() {
    let p = pipeline(Options {
        serialize_ingestion: false,
        ..Options::default()
    });
    p.put(
        "deck.pptx",
        &fixtures::pptx_with_slides(&[Slide::text("Agenda"), Slide::text("Roadmap")]),
    );

    let (a, b) = tokio::join!(
        p.service.ask("deck.pptx", "What is on the agenda?"),
        p.service.ask("deck.pptx", "What is on the roadmap?"),
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(
        p.record_ids("deck.pptx").await,
        vec!["deck.pptx_page_1_chunk_1", "deck.pptx_page_2_chunk_1"]
    );
}

#[tokio::test]
async fn test_concurrent_first_queries_with_lock_ingest_once() {
    let p = pipeline(Options::default());
    p.put("report.pdf", &fixtures::pdf_with_pages(&["One", "Two", "Three"]));

    let asks = (0..4).map(|i| {
        let question = if i % 2 == 0 { "one?" } else { "two?" };
        p.service.ask("report.pdf", question)
    });
    for result in join_all(asks).await {
        result.unwrap();
    }

    assert_eq!(p.record_ids("report.pdf").await.len(), 3);
    assert_eq!(p.backend.upserts.load(Ordering::SeqCst), 1);
}

// ========== OCR Tests ==========

#[tokio::test]
async fn test_scanned_pdf_answers_from_ocr_text() {
    let p = pipeline(Options {
        ocr_text: "Signed by the treasurer",
        scanned_pages: 3,
        ..Options::default()
    });
    p.put("scan.pdf", &fixtures::pdf_with_pages(&["", "", ""]));

    let answer = p.service.ask("scan.pdf", "Who signed it?").await.unwrap();

    assert_eq!(p.ocr.calls(), 3);
    assert_eq!(answer.relevant_chunks.len(), 3);
    assert!(answer
        .relevant_chunks
        .iter()
        .all(|c| c.text == "Signed by the treasurer"));
    let pages: HashSet<u32> = answer.relevant_chunks.iter().filter_map(|c| c.page).collect();
    assert_eq!(pages, HashSet::from([1, 2, 3]));
}

#[tokio::test]
async fn test_ocr_scratch_files_are_removed() {
    let p = pipeline(Options {
        ocr_text: "recovered",
        scanned_pages: 2,
        ..Options::default()
    });
    p.put("scan.pdf", &fixtures::pdf_with_pages(&["", ""]));

    p.service.ingest("scan.pdf").await.unwrap();

    let seen = p.ocr.seen();
    assert_eq!(seen.len(), 2);
    for image in &seen {
        assert!(!image.exists(), "{image:?} was left behind");
        assert!(!image.parent().unwrap().exists());
    }
}

#[tokio::test]
async fn test_docx_embedded_pictures_use_ocr_only_without_text() {
    let p = pipeline(Options {
        ocr_text: "picture words",
        ..Options::default()
    });
    p.put(
        "with-text.docx",
        &fixtures::docx_with_paragraphs(&["real text"], &["image1.png"]),
    );
    p.put(
        "pictures.docx",
        &fixtures::docx_with_paragraphs(&[], &["image1.png", "image2.png"]),
    );

    let report = p.service.ingest("with-text.docx").await.unwrap().unwrap();
    assert!(!report.ocr_used);
    assert_eq!(p.ocr.calls(), 0);

    let report = p.service.ingest("pictures.docx").await.unwrap().unwrap();
    assert!(report.ocr_used);
    assert_eq!(p.ocr.calls(), 2);
}

// ========== Isolation Tests ==========

#[tokio::test]
async fn test_documents_never_share_context() {
    let p = pipeline(Options::default());
    p.put("alpha.pdf", &fixtures::pdf_with_pages(&["alpha secret"]));
    p.put("beta.pdf", &fixtures::pdf_with_pages(&["beta secret"]));

    let a = p.service.ask("alpha.pdf", "secret").await.unwrap();
    let b = p.service.ask("beta.pdf", "secret").await.unwrap();

    assert!(a.relevant_chunks.iter().all(|c| c.text.contains("alpha")));
    assert!(b.relevant_chunks.iter().all(|c| c.text.contains("beta")));

    let prompts = p.generator.prompts.lock().unwrap().clone();
    assert!(!prompts[0].contains("beta"));
    assert!(!prompts[1].contains("alpha"));
}

#[tokio::test]
async fn test_listing_reports_status_per_document() {
    let p = pipeline(Options::default());
    p.put("a.pdf", &fixtures::pdf_with_pages(&["text a"]));
    p.put("b.docx", &fixtures::docx_with_paragraphs(&["text b"], &[]));
    p.put("notes.txt", b"unsupported");

    p.service.ingest("a.pdf").await.unwrap();

    let listed = p.service.list_documents().await.unwrap();
    let names: Vec<(&str, bool)> = listed.iter().map(|d| (d.name.as_str(), d.indexed)).collect();
    assert_eq!(names, vec![("a.pdf", true), ("b.docx", false)]);
}

// ========== Partial Write Tests ==========

#[tokio::test]
async fn test_partial_write_counts_as_indexed_under_any_record() {
    let p = pipeline(Options {
        batch_size: 1,
        ..Options::default()
    });
    p.put("long.pdf", &fixtures::pdf_with_pages(&["one", "two", "three"]));

    p.backend.fail_after(1);
    let err = p.service.ingest("long.pdf").await.unwrap_err();
    assert!(matches!(err, Error::Failed(ref msg) if msg.contains("connection reset")));

    // One batch landed, so the document looks indexed but is incomplete
    assert!(p.indexed("long.pdf").await);
    assert_eq!(p.record_ids("long.pdf").await.len(), 1);

    p.backend.heal();
    assert!(p.service.ingest("long.pdf").await.unwrap().is_none());
    assert_eq!(p.record_ids("long.pdf").await.len(), 1);
}

#[tokio::test]
async fn test_partial_write_is_retried_under_completion_marker() {
    let p = pipeline(Options {
        batch_size: 1,
        policy: IndexStatusPolicy::CompletionMarker,
        ..Options::default()
    });
    p.put("long.pdf", &fixtures::pdf_with_pages(&["one", "two", "three"]));

    p.backend.fail_after(2);
    assert!(p.service.ask("long.pdf", "two?").await.is_err());
    assert!(!p.indexed("long.pdf").await);

    p.backend.heal();
    let answer = p.service.ask("long.pdf", "two?").await.unwrap();
    assert!(p.indexed("long.pdf").await);

    assert_eq!(
        p.record_ids("long.pdf").await,
        vec![
            "long.pdf__complete",
            "long.pdf_page_1_chunk_1",
            "long.pdf_page_2_chunk_1",
            "long.pdf_page_3_chunk_1",
        ]
    );
    assert_eq!(answer.relevant_chunks.len(), 3);
}
