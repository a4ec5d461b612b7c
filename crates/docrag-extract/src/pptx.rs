//! PPTX text extractor.
//!
//! Each slide part `ppt/slides/slide<N>.xml` contributes one text unit tagged
//! with slide number `N`. When no slide has text, the pictures placed on each
//! slide are resolved through the slide's relationships, unpacked, and OCR'd.

use async_trait::async_trait;
use docrag_core::{DocumentKind, ExtractError, ExtractedText, OcrEngine, TextExtractor};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::ocr::recognize_all;
use crate::ooxml::{self, Package};

const SLIDE_DIR: &str = "ppt/slides";

/// Extractor for PPTX files.
pub struct PptxExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl PptxExtractor {
    /// Create a PPTX extractor with the given OCR fallback.
    #[must_use]
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

#[async_trait]
impl TextExtractor for PptxExtractor {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pptx
    }

    async fn extract(&self, bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
        let text = tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            move || extract_slides(&bytes)
        })
        .await
        .map_err(|e| ExtractError::Failed(format!("Task join error: {e}")))??;

        if !text.is_empty() {
            debug!("Extracted text from {} slides", text.units.len());
            return Ok(text);
        }

        info!("PPTX has no slide text, falling back to OCR of slide pictures");
        let workdir = tempfile::Builder::new().prefix("docrag-pptx-").tempdir()?;

        let images = tokio::task::spawn_blocking({
            let bytes = bytes.to_vec();
            let dir = workdir.path().to_path_buf();
            move || unpack_slide_pictures(&bytes, &dir)
        })
        .await
        .map_err(|e| ExtractError::Failed(format!("Task join error: {e}")))??;

        Ok(recognize_all(self.ocr.as_ref(), &images).await)
    }
}

/// Slide number of a slide part name, e.g. `ppt/slides/slide12.xml` is 12.
fn slide_number(name: &str) -> Option<u32> {
    name.strip_prefix(SLIDE_DIR)?
        .strip_prefix("/slide")?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

/// Slide parts sorted by slide number.
fn slides(package: &mut Package) -> Vec<(u32, String)> {
    let mut slides: Vec<(u32, String)> = package
        .entry_names()
        .into_iter()
        .filter_map(|name| slide_number(&name).map(|n| (n, name)))
        .collect();
    slides.sort_by_key(|(n, _)| *n);
    slides
}

fn extract_slides(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let mut package = Package::open(bytes)?;
    let mut text = ExtractedText::new();

    for (number, part) in slides(&mut package) {
        let Some(xml) = package.read_text(&part)? else {
            continue;
        };
        let lines = ooxml::paragraphs(&part, &xml, &ooxml::DRAWING)?;
        text.push(Some(number), &lines.join("\n"));
    }
    Ok(text)
}

fn unpack_slide_pictures(
    bytes: &[u8],
    dir: &Path,
) -> Result<Vec<(Option<u32>, PathBuf)>, ExtractError> {
    let mut package = Package::open(bytes)?;
    let mut targets: Vec<(u32, String)> = Vec::new();

    for (number, part) in slides(&mut package) {
        match slide_pictures(&mut package, number, &part) {
            Ok(pictures) => targets.extend(pictures.into_iter().map(|t| (number, t))),
            Err(e) => warn!("Failed to read pictures of slide {}: {}", number, e),
        }
    }

    let names: Vec<String> = targets.iter().map(|(_, name)| name.clone()).collect();
    Ok(package
        .unpack(&names, dir)
        .into_iter()
        .map(|(position, path)| (Some(targets[position].0), path))
        .collect())
}

/// Package part names of the pictures on one slide, in drawing order.
fn slide_pictures(
    package: &mut Package,
    number: u32,
    part: &str,
) -> Result<Vec<String>, ExtractError> {
    let Some(xml) = package.read_text(part)? else {
        return Ok(Vec::new());
    };
    let refs = ooxml::picture_refs(part, &xml)?;
    if refs.is_empty() {
        return Ok(Vec::new());
    }

    let rels_part = format!("{SLIDE_DIR}/_rels/slide{number}.xml.rels");
    let Some(rels_xml) = package.read_text(&rels_part)? else {
        warn!("Slide {} has pictures but no {}", number, rels_part);
        return Ok(Vec::new());
    };
    let rels = ooxml::relationships(&rels_part, &rels_xml)?;

    Ok(refs
        .iter()
        .filter_map(|id| rels.get(id))
        .map(|target| ooxml::resolve_target(SLIDE_DIR, target))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, CountingOcr, Slide};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_slide_number() {
        assert_eq!(slide_number("ppt/slides/slide1.xml"), Some(1));
        assert_eq!(slide_number("ppt/slides/slide12.xml"), Some(12));
        assert_eq!(slide_number("ppt/slides/_rels/slide1.xml.rels"), None);
        assert_eq!(slide_number("ppt/slideLayouts/slideLayout1.xml"), None);
        assert_eq!(slide_number("ppt/slides/slideX.xml"), None);
    }

    #[tokio::test]
    async fn test_slides_in_numeric_order() {
        let slides: Vec<Slide> = (1..=11)
            .map(|n| Slide::text(&format!("Slide {n} body")))
            .collect();
        let pptx = fixtures::pptx_with_slides(&slides);
        let ocr = Arc::new(CountingOcr::new("never"));

        let result = PptxExtractor::new(ocr.clone()).extract(&pptx).await.unwrap();

        let pages: Vec<u32> = result.units.iter().filter_map(|u| u.page).collect();
        assert_eq!(pages, (1..=11).collect::<Vec<_>>());
        assert_eq!(result.units[10].text, "Slide 11 body");
        assert!(!result.ocr_used);
        assert_eq!(ocr.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_slides_keep_numbering() {
        let pptx = fixtures::pptx_with_slides(&[
            Slide::text("first"),
            Slide::text(""),
            Slide::text("third"),
        ]);
        let ocr = Arc::new(CountingOcr::new("never"));
        let result = PptxExtractor::new(ocr).extract(&pptx).await.unwrap();

        let pages: Vec<Option<u32>> = result.units.iter().map(|u| u.page).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
    }

    #[tokio::test]
    async fn test_picture_only_deck_uses_ocr_per_picture() {
        let pptx = fixtures::pptx_with_slides(&[
            Slide::pictures(&["image1.png"]),
            Slide::pictures(&[]),
            Slide::pictures(&["image2.png", "image3.png"]),
        ]);
        let ocr = Arc::new(CountingOcr::new("scanned"));
        let result = PptxExtractor::new(ocr.clone()).extract(&pptx).await.unwrap();

        assert!(result.ocr_used);
        assert_eq!(ocr.calls(), 3);
        // Two pictures on slide 3 merge into one unit
        let pages: Vec<Option<u32>> = result.units.iter().map(|u| u.page).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
        assert_eq!(result.units[1].text, "scanned\nscanned");

        let dir = ocr.seen()[0].parent().unwrap().to_path_buf();
        assert!(!dir.exists(), "{dir:?} should have been removed");
    }

    #[tokio::test]
    async fn test_scratch_directory_removed_when_ocr_fails() {
        let pptx = fixtures::pptx_with_slides(&[Slide::pictures(&["image1.png", "image2.png"])]);
        let ocr = Arc::new(CountingOcr::failing());
        let result = PptxExtractor::new(ocr.clone()).extract(&pptx).await.unwrap();

        assert!(result.is_empty());
        assert_eq!(ocr.calls(), 2);
        let dir = ocr.seen()[0].parent().unwrap().to_path_buf();
        assert!(!dir.exists(), "{dir:?} should have been removed");
    }
}
