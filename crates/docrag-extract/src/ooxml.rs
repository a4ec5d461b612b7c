//! Shared reading of Office Open XML packages (DOCX and PPTX).
//!
//! Both formats are zip archives of XML parts. This module opens the archive,
//! pulls paragraph text out of a part, resolves relationship targets, and
//! unpacks embedded media for OCR.

use docrag_core::ExtractError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use zip::result::ZipError;
use zip::ZipArchive;

/// Element names that carry paragraph text in one OOXML dialect.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TextTags {
    /// Paragraph element
    pub paragraph: &'static [u8],
    /// Run element; tabs are only honored inside runs
    pub run: &'static [u8],
    /// Text element inside a run
    pub text: &'static [u8],
    /// Elements rendered as a line break
    pub breaks: &'static [&'static [u8]],
    /// Element rendered as a tab
    pub tab: &'static [u8],
}

/// WordprocessingML (`word/document.xml`).
pub(crate) const WORD: TextTags = TextTags {
    paragraph: b"w:p",
    run: b"w:r",
    text: b"w:t",
    breaks: &[b"w:br", b"w:cr"],
    tab: b"w:tab",
};

/// DrawingML text, as used on presentation slides.
pub(crate) const DRAWING: TextTags = TextTags {
    paragraph: b"a:p",
    run: b"a:r",
    text: b"a:t",
    breaks: &[b"a:br"],
    tab: b"a:tab",
};

/// Alternate content for older readers; repeats what `mc:Choice` already holds.
const FALLBACK: &[u8] = b"mc:Fallback";

fn xml_error(part: &str, e: impl std::fmt::Display) -> ExtractError {
    ExtractError::Parse(format!("{part}: {e}"))
}

/// Text of every paragraph in `xml`, in document order, untrimmed.
///
/// Paragraphs nested inside another paragraph (text boxes) are emitted
/// before the paragraph that contains them. `mc:Fallback` subtrees are
/// skipped.
pub(crate) fn paragraphs(
    part: &str,
    xml: &str,
    tags: &TextTags,
) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut open: Vec<String> = Vec::new();
    let mut out = Vec::new();
    let mut in_text = false;
    let mut run_depth = 0usize;

    loop {
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) if e.name().as_ref() == FALLBACK => {
                let end = e.to_end().into_owned();
                reader
                    .read_to_end(end.name())
                    .map_err(|e| xml_error(part, e))?;
            }
            Event::Start(e) => {
                let name = e.name();
                let name = name.as_ref();
                if name == tags.paragraph {
                    open.push(String::new());
                } else if name == tags.run {
                    run_depth += 1;
                } else if name == tags.text {
                    in_text = true;
                } else {
                    inline_mark(name, tags, run_depth, &mut open);
                }
            }
            Event::Empty(e) => {
                let name = e.name();
                let name = name.as_ref();
                if name == tags.paragraph {
                    out.push(String::new());
                } else {
                    inline_mark(name, tags, run_depth, &mut open);
                }
            }
            Event::Text(t) if in_text => {
                if let Some(current) = open.last_mut() {
                    let text = t.unescape().map_err(|e| xml_error(part, e))?;
                    current.push_str(&text);
                }
            }
            Event::End(e) => {
                let name = e.name();
                let name = name.as_ref();
                if name == tags.paragraph {
                    if let Some(done) = open.pop() {
                        out.push(done);
                    }
                } else if name == tags.run {
                    run_depth = run_depth.saturating_sub(1);
                } else if name == tags.text {
                    in_text = false;
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

fn inline_mark(name: &[u8], tags: &TextTags, run_depth: usize, open: &mut [String]) {
    let Some(current) = open.last_mut() else {
        return;
    };
    if tags.breaks.contains(&name) {
        current.push('\n');
    } else if name == tags.tab && run_depth > 0 {
        current.push('\t');
    }
}

/// Relationship id to target, skipping external targets.
pub(crate) fn relationships(part: &str, xml: &str) -> Result<HashMap<String, String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();

    loop {
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"Relationship" => {
                if attribute(&e, "TargetMode").as_deref() == Some("External") {
                    continue;
                }
                if let (Some(id), Some(target)) = (attribute(&e, "Id"), attribute(&e, "Target")) {
                    rels.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

/// Relationship ids of pictures (`a:blip r:embed`) inside `p:pic` elements.
pub(crate) fn picture_refs(part: &str, xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    let mut refs = Vec::new();
    let mut pic_depth = 0usize;

    loop {
        match reader.read_event().map_err(|e| xml_error(part, e))? {
            Event::Start(e) => match e.name().as_ref() {
                b"p:pic" => pic_depth += 1,
                b"a:blip" if pic_depth > 0 => refs.extend(attribute(&e, "r:embed")),
                _ => {}
            },
            Event::Empty(e) if pic_depth > 0 && e.name().as_ref() == b"a:blip" => {
                refs.extend(attribute(&e, "r:embed"));
            }
            Event::End(e) if e.name().as_ref() == b"p:pic" => {
                pic_depth = pic_depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(refs)
}

fn attribute(element: &BytesStart<'_>, key: &str) -> Option<String> {
    element
        .try_get_attribute(key)
        .ok()
        .flatten()
        .map(|attr| String::from_utf8_lossy(&attr.value).into_owned())
}

/// Resolve a relationship target relative to the directory of its source part.
pub(crate) fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = base_dir.split('/').filter(|s| !s.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// ============================================================================
// Package
// ============================================================================

/// An opened OOXML zip package.
pub(crate) struct Package {
    archive: ZipArchive<Cursor<Vec<u8>>>,
}

impl Package {
    /// Open a package from its bytes.
    pub fn open(bytes: &[u8]) -> Result<Self, ExtractError> {
        let archive = ZipArchive::new(Cursor::new(bytes.to_vec()))
            .map_err(|e| ExtractError::Parse(format!("Failed to open archive: {e}")))?;
        Ok(Self { archive })
    }

    /// Names of all file entries, in archive order.
    pub fn entry_names(&mut self) -> Vec<String> {
        (0..self.archive.len())
            .filter_map(|i| match self.archive.by_index(i) {
                Ok(entry) if !entry.is_dir() => Some(entry.name().to_string()),
                Ok(_) => None,
                Err(e) => {
                    warn!("Skipping unreadable archive entry {}: {}", i, e);
                    None
                }
            })
            .collect()
    }

    /// Read a part as UTF-8, or `None` if the package has no such part.
    pub fn read_text(&mut self, name: &str) -> Result<Option<String>, ExtractError> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(ExtractError::Parse(format!("{name}: {e}"))),
        };

        let mut text = String::new();
        entry
            .read_to_string(&mut text)
            .map_err(|e| ExtractError::Parse(format!("{name}: {e}")))?;
        Ok(Some(text))
    }

    /// Copy entries into `dir`, returning each written path with the position
    /// of its name in `names`.
    ///
    /// Files are named `<position>_<basename>` so repeated basenames do not
    /// collide. Entries that cannot be written are logged and skipped.
    pub fn unpack(&mut self, names: &[String], dir: &Path) -> Vec<(usize, PathBuf)> {
        let mut written = Vec::new();
        for (i, name) in names.iter().enumerate() {
            match self.unpack_one(name, i, dir) {
                Ok(path) => written.push((i, path)),
                Err(e) => warn!("Failed to unpack {}: {}", name, e),
            }
        }
        debug!("Unpacked {} of {} media entries", written.len(), names.len());
        written
    }

    fn unpack_one(&mut self, name: &str, position: usize, dir: &Path) -> Result<PathBuf, String> {
        let mut entry = self.archive.by_name(name).map_err(|e| e.to_string())?;
        let basename = entry
            .enclosed_name()
            .and_then(|p| p.file_name().map(|f| f.to_string_lossy().into_owned()))
            .ok_or_else(|| "unsafe entry name".to_string())?;

        let path = dir.join(format!("{position}_{basename}"));
        let mut file = std::fs::File::create(&path).map_err(|e| e.to_string())?;
        std::io::copy(&mut entry, &mut file).map_err(|e| e.to_string())?;
        Ok(path)
    }
}
