//! Extractor registry keyed by document format.

use docrag_core::{
    DocumentKind, ExtractError, ExtractedText, OcrEngine, PageRasterizer, TextExtractor,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::docx::DocxExtractor;
use crate::ocr::TesseractOcr;
use crate::pdf::PdfExtractor;
use crate::pptx::PptxExtractor;
use crate::raster::PdftoppmRasterizer;

/// One extractor per supported format, sharing an OCR fallback.
pub struct ExtractorRegistry {
    pdf: PdfExtractor,
    docx: DocxExtractor,
    pptx: PptxExtractor,
}

impl ExtractorRegistry {
    /// Create a registry using `ocr` for scanned content and `rasterizer`
    /// to turn scanned PDF pages into images.
    #[must_use]
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        Self {
            pdf: PdfExtractor::new(Arc::clone(&ocr), rasterizer),
            docx: DocxExtractor::new(Arc::clone(&ocr)),
            pptx: PptxExtractor::new(ocr),
        }
    }

    /// The extractor for a format.
    #[must_use]
    pub fn get(&self, kind: DocumentKind) -> &dyn TextExtractor {
        match kind {
            DocumentKind::Pdf => &self.pdf,
            DocumentKind::Docx => &self.docx,
            DocumentKind::Pptx => &self.pptx,
        }
    }

    /// Extract text from a named document, choosing the extractor by the
    /// name's extension.
    pub async fn extract(&self, name: &str, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let kind = DocumentKind::from_name(name)?;
        debug!("Extracting {} ({}, {} bytes)", name, kind, bytes.len());

        let text = self.get(kind).extract(bytes).await?;
        if text.ocr_used {
            info!("Extracted {} via OCR ({} units)", name, text.units.len());
        }
        Ok(text)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new(
            Arc::new(TesseractOcr::new()),
            Arc::new(PdftoppmRasterizer::new()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, CountingOcr, FakeRasterizer, Slide};

    fn registry(ocr: Arc<CountingOcr>) -> ExtractorRegistry {
        ExtractorRegistry::new(ocr, Arc::new(FakeRasterizer::new(1)))
    }

    #[test]
    fn test_every_kind_has_an_extractor() {
        let registry = registry(Arc::new(CountingOcr::new("")));
        for kind in DocumentKind::ALL {
            assert_eq!(registry.get(kind).kind(), kind);
        }
    }

    #[tokio::test]
    async fn test_extract_routes_by_extension() {
        let registry = registry(Arc::new(CountingOcr::new("never")));

        let pdf = fixtures::pdf_with_pages(&["pdf body"]);
        let text = registry.extract("Report.PDF", &pdf).await.unwrap();
        assert!(text.text().contains("pdf body"));

        let docx = fixtures::docx_with_paragraphs(&["docx body"], &[]);
        let text = registry.extract("notes.docx", &docx).await.unwrap();
        assert_eq!(text.text(), "docx body");

        let pptx = fixtures::pptx_with_slides(&[Slide::text("pptx body")]);
        let text = registry.extract("deck.pptx", &pptx).await.unwrap();
        assert_eq!(text.text(), "pptx body");
    }

    #[tokio::test]
    async fn test_extract_unsupported_format() {
        let ocr = Arc::new(CountingOcr::new("never"));
        let result = registry(ocr.clone()).extract("notes.txt", b"hello").await;

        match result {
            Err(ExtractError::UnsupportedFormat(name)) => assert_eq!(name, "notes.txt"),
            other => panic!("Expected UnsupportedFormat error, got {other:?}"),
        }
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_extension_decides_not_content() {
        let registry = registry(Arc::new(CountingOcr::new("never")));
        let pdf = fixtures::pdf_with_pages(&["body"]);

        let result = registry.extract("mislabeled.docx", &pdf).await;
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }
}
