//! PDF page rasterization for the OCR fallback.
//!
//! Two strategies are available:
//!
//! - [`PdftoppmRasterizer`] renders each page with poppler's `pdftoppm`,
//!   which handles vector content and is the default.
//! - [`EmbeddedImageRasterizer`] needs no external tools. It takes the
//!   largest embedded image on each page, which is what a scanner produces.

use async_trait::async_trait;
use docrag_core::{OcrError, PageImage, PageRasterizer};
use flate2::read::ZlibDecoder;
use lopdf::Document;
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// File name prefix of rendered pages inside the work directory.
const PAGE_PREFIX: &str = "page";

/// Rasterizer backed by the `pdftoppm` binary.
pub struct PdftoppmRasterizer {
    binary: PathBuf,
    dpi: u32,
}

impl PdftoppmRasterizer {
    /// Create a rasterizer using `pdftoppm` from `PATH` at 200 DPI.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("pdftoppm"),
            dpi: 200,
        }
    }

    /// Use a specific pdftoppm binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Render at `dpi` dots per inch.
    #[must_use]
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }
}

impl Default for PdftoppmRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    async fn rasterize(&self, pdf: &[u8], workdir: &Path) -> Result<Vec<PageImage>, OcrError> {
        let input = workdir.join("document.pdf");
        tokio::fs::write(&input, pdf).await?;

        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-png")
            .arg(&input)
            .arg(workdir.join(PAGE_PREFIX))
            .output()
            .await
            .map_err(|e| OcrError::Rasterize(format!("failed to run {:?}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Rasterize(format!(
                "pdftoppm exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let pages = collect_pages(workdir).await?;
        debug!("pdftoppm rendered {} pages at {} DPI", pages.len(), self.dpi);
        Ok(pages)
    }
}

/// Find rendered `page-<n>.<ext>` files in `dir`, sorted by page number.
///
/// pdftoppm zero-pads the page number according to the page count, so the
/// number is parsed rather than relying on lexical order.
async fn collect_pages(dir: &Path) -> Result<Vec<PageImage>, OcrError> {
    let mut pages = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if let Some(page) = page_number(&path) {
            pages.push(PageImage { page, path });
        }
    }

    pages.sort_by_key(|p| p.page);
    Ok(pages)
}

fn page_number(path: &Path) -> Option<u32> {
    let ext = path.extension()?.to_str()?;
    if ext.eq_ignore_ascii_case("pdf") {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let number = stem.strip_prefix(PAGE_PREFIX)?.strip_prefix('-')?;
    number.parse().ok()
}

// ============================================================================
// Embedded image rasterizer
// ============================================================================

/// Rasterizer that extracts the largest embedded image of each page.
///
/// Pages without a decodable image are skipped.
pub struct EmbeddedImageRasterizer;

impl EmbeddedImageRasterizer {
    /// Create a new embedded image rasterizer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for EmbeddedImageRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageRasterizer for EmbeddedImageRasterizer {
    fn name(&self) -> &str {
        "embedded"
    }

    async fn rasterize(&self, pdf: &[u8], workdir: &Path) -> Result<Vec<PageImage>, OcrError> {
        let bytes = pdf.to_vec();
        let workdir = workdir.to_path_buf();

        tokio::task::spawn_blocking(move || write_page_images(&bytes, &workdir))
            .await
            .map_err(|e| OcrError::Rasterize(format!("Task join error: {e}")))?
    }
}

fn write_page_images(bytes: &[u8], workdir: &Path) -> Result<Vec<PageImage>, OcrError> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| OcrError::Rasterize(format!("Failed to load PDF: {e}")))?;

    let mut pages = Vec::new();
    for (page, page_id) in doc.get_pages() {
        let images = match doc.get_page_images(page_id) {
            Ok(images) => images,
            Err(e) => {
                debug!("Failed to get images from page {}: {}", page, e);
                continue;
            }
        };

        let Some(largest) = images.iter().max_by_key(|img| img.width * img.height) else {
            debug!("Page {} has no embedded images", page);
            continue;
        };

        let Some((data, ext)) = decode_pdf_image(largest) else {
            continue;
        };

        let path = workdir.join(format!("{PAGE_PREFIX}-{page}.{ext}"));
        std::fs::write(&path, data)?;
        pages.push(PageImage { page, path });
    }

    debug!("Extracted {} page images from PDF", pages.len());
    Ok(pages)
}

/// Decode a PDF image into encoded file bytes and a file extension.
fn decode_pdf_image(pdf_image: &lopdf::xobject::PdfImage) -> Option<(Vec<u8>, &'static str)> {
    let filters = pdf_image.filters.as_ref()?;

    if filters.iter().any(|f| f == "DCTDecode") {
        Some((pdf_image.content.to_vec(), "jpg"))
    } else if filters.iter().any(|f| f == "FlateDecode") {
        match decode_flate_image(pdf_image) {
            Ok(data) => Some((data, "png")),
            Err(e) => {
                warn!("Failed to decode FlateDecode image: {}", e);
                None
            }
        }
    } else if filters.iter().any(|f| f == "JPXDecode") {
        Some((pdf_image.content.to_vec(), "jp2"))
    } else {
        debug!("Unsupported image filter: {:?}", filters);
        None
    }
}

/// Decode a `FlateDecode` raw bitmap and re-encode it as PNG.
fn decode_flate_image(pdf_image: &lopdf::xobject::PdfImage) -> Result<Vec<u8>, String> {
    let mut decoder = ZlibDecoder::new(pdf_image.content);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(|e| format!("Decompression failed: {e}"))?;

    let width = u32::try_from(pdf_image.width).map_err(|_| "invalid width".to_string())?;
    let height = u32::try_from(pdf_image.height).map_err(|_| "invalid height".to_string())?;

    let img = match pdf_image.color_space.as_deref().unwrap_or("DeviceRGB") {
        "DeviceGray" | "Gray" | "CalGray" => {
            image::GrayImage::from_raw(width, height, raw).map(image::DynamicImage::ImageLuma8)
        }
        "DeviceCMYK" | "CMYK" => image::RgbImage::from_raw(width, height, cmyk_to_rgb(&raw))
            .map(image::DynamicImage::ImageRgb8),
        _ => image::RgbImage::from_raw(width, height, raw).map(image::DynamicImage::ImageRgb8),
    };
    let img = img.ok_or_else(|| "bitmap size does not match dimensions".to_string())?;

    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| format!("PNG encoding failed: {e}"))?;
    Ok(png)
}

/// Convert CMYK bytes to RGB.
#[allow(clippy::many_single_char_names)]
fn cmyk_to_rgb(cmyk: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((cmyk.len() / 4) * 3);
    for px in cmyk.chunks_exact(4) {
        let k = 1.0 - f32::from(px[3]) / 255.0;
        for &ink in &px[..3] {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            rgb.push((255.0 * (1.0 - f32::from(ink) / 255.0) * k) as u8);
        }
    }
    rgb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn test_page_number_parsing() {
        assert_eq!(page_number(Path::new("/w/page-1.png")), Some(1));
        assert_eq!(page_number(Path::new("/w/page-007.png")), Some(7));
        assert_eq!(page_number(Path::new("/w/page-12.jpg")), Some(12));
        assert_eq!(page_number(Path::new("/w/document.pdf")), None);
        assert_eq!(page_number(Path::new("/w/page.png")), None);
        assert_eq!(page_number(Path::new("/w/other-3.png")), None);
    }

    #[tokio::test]
    async fn test_collect_pages_sorts_numerically() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["page-10.png", "page-02.png", "page-1.png", "document.pdf", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let pages = collect_pages(dir.path()).await.unwrap();
        let numbers: Vec<u32> = pages.iter().map(|p| p.page).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
    }

    #[test]
    fn test_cmyk_to_rgb() {
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0]), vec![255, 255, 255]);
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 255]), vec![0, 0, 0]);
        assert_eq!(cmyk_to_rgb(&[255, 0, 0, 0]), vec![0, 255, 255]);
        // Trailing partial pixel is ignored
        assert_eq!(cmyk_to_rgb(&[0, 0, 0, 0, 1, 2]).len(), 3);
    }

    #[tokio::test]
    async fn test_pdftoppm_missing_binary_is_rasterize_error() {
        let dir = tempfile::tempdir().unwrap();
        let rasterizer = PdftoppmRasterizer::new().with_binary("/nonexistent/bin/pdftoppm");

        let result = rasterizer.rasterize(b"%PDF-1.5", dir.path()).await;
        assert!(matches!(result, Err(OcrError::Rasterize(_))));
    }

    #[tokio::test]
    async fn test_embedded_rasterizer_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let pdf = fixtures::pdf_with_pages(&["text only"]);

        let pages = EmbeddedImageRasterizer::new()
            .rasterize(&pdf, dir.path())
            .await
            .unwrap();
        assert!(pages.is_empty());
    }

    #[tokio::test]
    async fn test_embedded_rasterizer_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let result = EmbeddedImageRasterizer::new()
            .rasterize(b"not a pdf", dir.path())
            .await;
        assert!(matches!(result, Err(OcrError::Rasterize(_))));
    }

    #[test]
    fn test_rasterizer_names() {
        assert_eq!(PdftoppmRasterizer::default().with_dpi(300).dpi, 300);
        assert_eq!(PdftoppmRasterizer::default().name(), "pdftoppm");
        assert_eq!(EmbeddedImageRasterizer::default().name(), "embedded");
    }
}
