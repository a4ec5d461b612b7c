//! Document builders and fake OCR collaborators for tests.
//!
//! Available to this crate's tests and, through the `fixtures` feature, to
//! tests in dependent crates.

#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use docrag_core::{OcrEngine, OcrError, PageImage, PageRasterizer};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Placeholder bytes for embedded pictures; OCR fakes never decode them.
const FAKE_IMAGE: &[u8] = b"\x89PNG\r\n\x1a\nfake";

// ============================================================================
// PDF
// ============================================================================

/// Build a PDF with one page per entry, one text object per line. Empty
/// entries produce pages with no text, which is how a scanned page looks to
/// the text layer.
#[must_use]
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let mut operations = Vec::new();
        for (row, line) in (0i64..).zip(text.lines().filter(|line| !line.is_empty())) {
            operations.extend([
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), (720 - 14 * row).into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ]);
        }
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        kids.push(page_id.into());
    }

    let count = i64::try_from(kids.len()).expect("page count");
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save PDF");
    bytes
}

// ============================================================================
// Office Open XML
// ============================================================================

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn zip_entries(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options).expect("start zip entry");
        zip.write_all(bytes).expect("write zip entry");
    }
    zip.finish().expect("finish zip").into_inner()
}

/// Build a DOCX with the given body paragraphs and `word/media` files.
#[must_use]
pub fn docx_with_paragraphs(paragraphs: &[&str], images: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| {
            if p.is_empty() {
                "<w:p/>".to_string()
            } else {
                format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", escape(p))
            }
        })
        .collect();
    let document = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
         <w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\">\
         <w:body>{body}<w:sectPr/></w:body></w:document>"
    );

    let mut entries = vec![
        ("[Content_Types].xml".to_string(), b"<Types/>".to_vec()),
        ("word/document.xml".to_string(), document.into_bytes()),
    ];
    for image in images {
        entries.push((format!("word/media/{image}"), FAKE_IMAGE.to_vec()));
    }
    zip_entries(&entries)
}

/// Contents of one fixture slide.
#[derive(Debug, Clone, Default)]
pub struct Slide {
    text: String,
    pictures: Vec<String>,
}

impl Slide {
    /// A slide with text; each line becomes a paragraph.
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            pictures: Vec::new(),
        }
    }

    /// A slide holding only pictures with the given media file names.
    #[must_use]
    pub fn pictures(names: &[&str]) -> Self {
        Self {
            text: String::new(),
            pictures: names.iter().map(|n| (*n).to_string()).collect(),
        }
    }
}

/// Build a PPTX with the given slides, numbered from 1.
///
/// Slide parts are written in reverse order so readers cannot rely on
/// archive order.
#[must_use]
pub fn pptx_with_slides(slides: &[Slide]) -> Vec<u8> {
    let mut entries = vec![("[Content_Types].xml".to_string(), b"<Types/>".to_vec())];

    for (i, slide) in slides.iter().enumerate().rev() {
        let number = i + 1;
        let paragraphs: String = slide
            .text
            .lines()
            .map(|line| format!("<a:p><a:r><a:t>{}</a:t></a:r></a:p>", escape(line)))
            .collect();
        let pictures: String = (1..=slide.pictures.len())
            .map(|rid| {
                format!(
                    "<p:pic><p:blipFill><a:blip r:embed=\"rId{rid}\"/></p:blipFill></p:pic>"
                )
            })
            .collect();
        let xml = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\
             <p:sld xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\" \
             xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\" \
             xmlns:r=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships\">\
             <p:cSld><p:spTree><p:sp><p:txBody>{paragraphs}</p:txBody></p:sp>{pictures}\
             </p:spTree></p:cSld></p:sld>"
        );
        entries.push((format!("ppt/slides/slide{number}.xml"), xml.into_bytes()));

        if !slide.pictures.is_empty() {
            let rels: String = slide
                .pictures
                .iter()
                .enumerate()
                .map(|(j, name)| {
                    format!(
                        "<Relationship Id=\"rId{}\" Type=\"image\" Target=\"../media/{name}\"/>",
                        j + 1
                    )
                })
                .collect();
            entries.push((
                format!("ppt/slides/_rels/slide{number}.xml.rels"),
                format!("<Relationships>{rels}</Relationships>").into_bytes(),
            ));
            for name in &slide.pictures {
                entries.push((format!("ppt/media/{name}"), FAKE_IMAGE.to_vec()));
            }
        }
    }
    zip_entries(&entries)
}

// ============================================================================
// OCR fakes
// ============================================================================

/// OCR engine that returns fixed text and records every image it sees.
///
/// Recognition fails for paths that do not exist, so a passing test also
/// proves the image was written before OCR ran.
pub struct CountingOcr {
    text: String,
    fail: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl CountingOcr {
    /// Create an engine recognizing `text` in every image.
    #[must_use]
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fail: false,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Create an engine whose every recognition fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    /// Number of recognition calls so far.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Paths passed to the engine, in call order.
    #[must_use]
    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl OcrEngine for CountingOcr {
    fn name(&self) -> &str {
        "counting"
    }

    async fn recognize(&self, image: &Path) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(image.to_path_buf());
        }
        if !image.exists() {
            return Err(OcrError::Engine(format!("missing image {image:?}")));
        }
        if self.fail {
            return Err(OcrError::Engine("engine crashed".to_string()));
        }
        Ok(self.text.clone())
    }
}

/// Rasterizer that writes a fixed number of placeholder page images.
pub struct FakeRasterizer {
    pages: u32,
}

impl FakeRasterizer {
    /// Create a rasterizer producing `pages` images.
    #[must_use]
    pub fn new(pages: u32) -> Self {
        Self { pages }
    }
}

#[async_trait]
impl PageRasterizer for FakeRasterizer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn rasterize(&self, _pdf: &[u8], workdir: &Path) -> Result<Vec<PageImage>, OcrError> {
        let mut pages = Vec::new();
        for page in 1..=self.pages {
            let path = workdir.join(format!("page-{page}.png"));
            tokio::fs::write(&path, FAKE_IMAGE).await?;
            pages.push(PageImage { page, path });
        }
        Ok(pages)
    }
}
