//! Optical character recognition for the scanned-image fallback.
//!
//! [`TesseractOcr`] drives the `tesseract` command-line tool. A
//! [`PlaceholderOcr`] is provided for setups without an OCR engine; it
//! recognizes nothing, so scanned documents index as empty.

use async_trait::async_trait;
use docrag_core::{ExtractedText, OcrEngine, OcrError};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

/// OCR engine backed by the `tesseract` binary.
pub struct TesseractOcr {
    binary: PathBuf,
    language: String,
}

impl TesseractOcr {
    /// Create an engine using `tesseract` from `PATH` with English data.
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
            language: "eng".to_string(),
        }
    }

    /// Use a specific tesseract binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Use a specific language pack, e.g. `eng+deu`.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        debug!("Running tesseract on {:?}", image);

        let output = Command::new(&self.binary)
            .arg(image)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .await
            .map_err(|e| OcrError::Engine(format!("failed to run {:?}: {e}", self.binary)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::Engine(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// OCR engine that recognizes no text.
pub struct PlaceholderOcr;

impl PlaceholderOcr {
    /// Create a new placeholder engine.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlaceholderOcr {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for PlaceholderOcr {
    fn name(&self) -> &str {
        "placeholder"
    }

    async fn recognize(&self, _image: &Path) -> Result<String, OcrError> {
        Ok(String::new())
    }
}

/// Run OCR over `images` in order, one call per image.
///
/// A failing image is logged and skipped. The result is flagged as produced
/// by the fallback even if nothing was recognized.
pub async fn recognize_all(
    engine: &dyn OcrEngine,
    images: &[(Option<u32>, PathBuf)],
) -> ExtractedText {
    let mut text = ExtractedText::new();
    text.ocr_used = true;

    for (page, path) in images {
        match engine.recognize(path).await {
            Ok(recognized) => {
                if recognized.trim().is_empty() {
                    debug!("No text recognized in {:?}", path);
                }
                text.push(*page, &recognized);
            }
            Err(e) => {
                warn!("OCR failed for {:?}: {}", path, e);
            }
        }
    }

    debug!(
        "OCR recognized text in {} of {} images with {}",
        text.units.len(),
        images.len(),
        engine.name()
    );
    text
}
