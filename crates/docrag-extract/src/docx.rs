//! DOCX text extractor.
//!
//! Paragraph text is read from `word/document.xml`. A document without any
//! text is assumed to be a scan pasted as pictures: every file under
//! `word/media/` is unpacked to a scratch directory and OCR'd in archive order.

use async_trait::async_trait;
use docrag_core::{DocumentKind, ExtractError, ExtractedText, OcrEngine, TextExtractor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::ocr::recognize_all;
use crate::ooxml::{self, Package};

const DOCUMENT_PART: &str = "word/document.xml";
const MEDIA_PREFIX: &str = "word/media/";

/// Extractor for DOCX files.
pub struct DocxExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl DocxExtractor {
    /// Create a DOCX extractor with the given OCR fallback.
    #[must_use]
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

#[async_trait]
impl TextExtractor for DocxExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Docx
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let text = tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            move || extract_paragraphs(&bytes)
        })
        .await
        .map_err(|e| ExtractError::Failed(format!("Task join error: {e}")))??;

        if !text.is_empty() {
            debug!("Extracted {} chars from DOCX", text.text().len());
            return Ok(text);
        }

        info!("DOCX has no paragraph text, falling back to OCR of embedded images");
        let workdir = tempfile::Builder::new().prefix("docrag-docx-").tempdir()?;

        let images = tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            let dir = workdir.path().to_path_buf();
            move || unpack_media(&bytes, &dir)
        })
        .await
        .map_err(|e| ExtractError::Failed(format!("Task join error: {e}")))??;

        Ok(recognize_all(self.ocr.as_ref(), &images).await)
    }
}

fn extract_paragraphs(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let mut package = Package::open(bytes)?;
    let xml = package
        .read_text(DOCUMENT_PART)?
        .ok_or_else(|| ExtractError::Parse(format!("missing {DOCUMENT_PART}")))?;

    let mut text = ExtractedText::new();
    for paragraph in ooxml::paragraphs(DOCUMENT_PART, &xml, &ooxml::WORD)? {
        text.push(None, &paragraph);
    }
    Ok(text)
}

fn unpack_media(bytes: &[u8], dir: &Path) -> Result<Vec<(Option<u32>, PathBuf)>, ExtractError> {
    let mut package = Package::open(bytes)?;
    let media: Vec<String> = package
        .entry_names()
        .into_iter()
        .filter(|name| name.starts_with(MEDIA_PREFIX))
        .collect();
    Ok(package
        .unpack(&media, dir)
        .into_iter()
        .map(|(_, path)| (None, path))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, CountingOcr};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_paragraph_text() {
        let docx = fixtures::docx_with_paragraphs(&["Intro", "", "Second paragraph"], &[]);
        let ocr = Arc::new(CountingOcr::new("never"));
        let result = DocxExtractor::new(ocr.clone()).extract(&docx).await.unwrap();

        assert!(!result.ocr_used);
        assert!(!result.has_pages());
        assert_eq!(result.text(), "Intro\nSecond paragraph");
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_text_with_images_skips_ocr() {
        let docx = fixtures::docx_with_paragraphs(&["Caption"], &["image1.png"]);
        let ocr = Arc::new(CountingOcr::new("never"));
        DocxExtractor::new(ocr.clone()).extract(&docx).await.unwrap();
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_image_only_docx_uses_ocr_per_image() {
        let docx = fixtures::docx_with_paragraphs(&[], &["image1.png", "image2.jpeg"]);
        let ocr = Arc::new(CountingOcr::new("recognized"));
        let result = DocxExtractor::new(ocr.clone()).extract(&docx).await.unwrap();

        assert!(result.ocr_used);
        assert_eq!(ocr.calls(), 2);
        assert_eq!(result.text(), "recognized\nrecognized");

        let seen = ocr.seen();
        assert!(seen[0].ends_with("0_image1.png"));
        assert!(seen[1].ends_with("1_image2.jpeg"));
        let dir = seen[0].parent().unwrap();
        assert!(!dir.exists(), "{dir:?} should have been removed");
    }

    #[tokio::test]
    async fn test_scratch_directory_removed_when_ocr_fails() {
        let docx = fixtures::docx_with_paragraphs(&[], &["image1.png", "image2.png"]);
        let ocr = Arc::new(CountingOcr::failing());
        let result = DocxExtractor::new(ocr.clone()).extract(&docx).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(ocr.calls(), 2);
        let dir = ocr.seen()[0].parent().unwrap().to_path_buf();
        assert!(!dir.exists(), "{dir:?} should have been removed");
    }

    #[tokio::test]
    async fn test_empty_docx_without_images() {
        let docx = fixtures::docx_with_paragraphs(&["   "], &[]);
        let ocr = Arc::new(CountingOcr::new("never"));
        let result = DocxExtractor::new(ocr.clone()).extract(&docx).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_not_a_zip_is_parse_error() {
        let ocr = Arc::new(CountingOcr::new("never"));
        let result = DocxExtractor::new(ocr).extract(b"plain bytes").await;
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }
}
