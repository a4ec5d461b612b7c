//! # docrag-extract
//!
//! Text extraction from stored documents for the docrag indexing pipeline.
//!
//! Each extractor turns raw document bytes into
//! [`ExtractedText`](docrag_core::ExtractedText) for downstream chunking.
//!
//! ## Supported Formats
//!
//! | Extractor | Format | Units | OCR fallback |
//! |-----------|--------|-------|--------------|
//! | [`PdfExtractor`] | `.pdf` | one per page | every page rasterized |
//! | [`DocxExtractor`] | `.docx` | one for the whole body | every `word/media` image |
//! | [`PptxExtractor`] | `.pptx` | one per slide | every picture placed on a slide |
//!
//! OCR runs only when structured extraction recovers no text at all. Scratch
//! files live in a temporary directory that is removed when extraction
//! finishes, whether it succeeded or not.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docrag_extract::ExtractorRegistry;
//!
//! let registry = ExtractorRegistry::default();
//! let text = registry.extract("report.pdf", &bytes).await?;
//! println!("Extracted {} units (ocr: {})", text.units.len(), text.ocr_used);
//! ```
//!
//! ## Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ExtractorRegistry`] | Routes documents to extractors by extension |
//! | [`TesseractOcr`] | OCR through the `tesseract` binary |
//! | [`PlaceholderOcr`] | OCR engine that recognizes nothing |
//! | [`PdftoppmRasterizer`] | Renders PDF pages with `pdftoppm` |
//! | [`EmbeddedImageRasterizer`] | Pulls each page's largest embedded image |

pub mod docx;
pub mod ocr;
mod ooxml;
pub mod pdf;
pub mod pptx;
pub mod raster;
pub mod registry;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use docx::DocxExtractor;
pub use ocr::{recognize_all, PlaceholderOcr, TesseractOcr};
pub use pdf::PdfExtractor;
pub use pptx::PptxExtractor;
pub use raster::{EmbeddedImageRasterizer, PdftoppmRasterizer};
pub use registry::ExtractorRegistry;
