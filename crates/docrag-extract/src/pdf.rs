//! PDF text extractor.
//!
//! Text is read page by page with lopdf. When no page yields any text the
//! document is treated as scanned: pages are rasterized into a scratch
//! directory and passed through OCR one at a time.

use async_trait::async_trait;
use docrag_core::{
    DocumentKind, ExtractError, ExtractedText, OcrEngine, PageRasterizer, TextExtractor,
};
use lopdf::Document;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ocr::recognize_all;

/// Extractor for PDF files.
pub struct PdfExtractor {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
}

impl PdfExtractor {
    /// Create a PDF extractor with the given OCR fallback.
    #[must_use]
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self { ocr, rasterizer }
    }

    async fn extract_scanned(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let workdir = tempfile::Builder::new().prefix("docrag-pdf-").tempdir()?;
        debug!("Rasterizing PDF into {:?}", workdir.path());

        let pages = match self.rasterizer.rasterize(bytes, workdir.path()).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("Rasterization with {} failed: {}", self.rasterizer.name(), e);
                Vec::new()
            }
        };

        let images: Vec<_> = pages.into_iter().map(|p| (Some(p.page), p.path)).collect();
        let text = recognize_all(self.ocr.as_ref(), &images).await;

        // workdir is removed when it drops, on success and error alike
        Ok(text)
    }
}

#[async_trait]
impl TextExtractor for PdfExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let text = tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            move || extract_page_text(&bytes)
        })
        .await
        .map_err(|e| ExtractError::Failed(format!("Task join error: {e}")))??;

        if !text.is_empty() {
            debug!("Extracted text from {} PDF pages", text.units.len());
            return Ok(text);
        }

        info!("PDF has no extractable text, falling back to OCR");
        self.extract_scanned(bytes).await
    }
}

/// Extract text from every page. Pages that fail to decode are skipped.
fn extract_page_text(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| ExtractError::Parse(format!("Failed to load PDF: {e}")))?;

    let mut text = ExtractedText::new();
    for page in doc.get_pages().into_keys() {
        match doc.extract_text(&[page]) {
            Ok(page_text) => text.push(Some(page), &page_text),
            Err(e) => warn!("Failed to extract text from page {}: {}", page, e),
        }
    }
    Ok(text)
}
