//! Greedy paragraph chunking.
//!
//! Text is split on line boundaries into paragraphs; blank lines are dropped.
//! Paragraphs accumulate into a buffer, joined by a blank line, for as long as
//! the buffer stays within `chunk_size` characters. A paragraph that does not
//! fit flushes the buffer and starts the next chunk. Paragraphs are never split,
//! so a single paragraph longer than `chunk_size` becomes a chunk of its own.

use docrag_core::{Chunk, ChunkConfig, ChunkError, Chunker, ExtractedText};
use tracing::debug;

/// Separator placed between paragraphs inside a chunk.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// Paragraph-greedy chunker.
///
/// When extraction preserved page boundaries, each page is chunked on its own
/// and chunk ids take the form `page_<n>_chunk_<k>`, with `k` restarting at 1
/// on every page. Otherwise chunks are numbered densely across the document as
/// `chunk_<k>`.
pub struct ParagraphChunker;

impl ParagraphChunker {
    /// Create a new paragraph chunker.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for ParagraphChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl Chunker for ParagraphChunker {
    fn name(&self) -> &str {
        "paragraph"
    }

    fn chunk(
        &self,
        content: &ExtractedText,
        config: &ChunkConfig,
    ) -> Result<Vec<Chunk>, ChunkError> {
        if config.chunk_size == 0 {
            return Err(ChunkError::InvalidConfig(
                "chunk_size must be > 0".to_string(),
            ));
        }

        let chunks: Vec<Chunk> = if content.has_pages() {
            content
                .units
                .iter()
                .flat_map(|unit| {
                    let page = unit.page;
                    pack_paragraphs(&unit.text, config.chunk_size)
                        .into_iter()
                        .enumerate()
                        .map(move |(i, text)| Chunk {
                            id: chunk_id(page, i + 1),
                            text,
                            page,
                        })
                })
                .collect()
        } else {
            pack_paragraphs(&content.text(), config.chunk_size)
                .into_iter()
                .enumerate()
                .map(|(i, text)| Chunk {
                    id: chunk_id(None, i + 1),
                    text,
                    page: None,
                })
                .collect()
        };

        debug!(
            "Chunked {} units into {} chunks (chunk_size: {})",
            content.units.len(),
            chunks.len(),
            config.chunk_size
        );
        Ok(chunks)
    }
}

/// Build a chunk identifier.
#[must_use]
pub fn chunk_id(page: Option<u32>, index: usize) -> String {
    match page {
        Some(page) => format!("page_{page}_chunk_{index}"),
        None => format!("chunk_{index}"),
    }
}

/// Non-blank lines of `text`, trimmed.
fn paragraphs(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

/// Greedily pack the paragraphs of `text` into chunk texts.
fn pack_paragraphs(text: &str, chunk_size: usize) -> Vec<String> {
    let separator_len = PARAGRAPH_SEPARATOR.chars().count();
    let mut chunks = Vec::new();
    let mut buffer = String::new();
    let mut buffer_len = 0usize;

    for paragraph in paragraphs(text) {
        let paragraph_len = paragraph.chars().count();

        if buffer.is_empty() {
            buffer.push_str(paragraph);
            buffer_len = paragraph_len;
        } else if buffer_len + separator_len + paragraph_len <= chunk_size {
            buffer.push_str(PARAGRAPH_SEPARATOR);
            buffer.push_str(paragraph);
            buffer_len += separator_len + paragraph_len;
        } else {
            chunks.push(std::mem::take(&mut buffer));
            buffer.push_str(paragraph);
            buffer_len = paragraph_len;
        }
    }

    if !buffer.is_empty() {
        chunks.push(buffer);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn doc(text: &str) -> ExtractedText {
        let mut content = ExtractedText::new();
        content.push(None, text);
        content
    }

    fn paged(pages: &[&str]) -> ExtractedText {
        let mut content = ExtractedText::new();
        for (i, text) in pages.iter().enumerate() {
            content.push(Some(i as u32 + 1), text);
        }
        content
    }

    fn chunk(content: &ExtractedText, chunk_size: usize) -> Vec<Chunk> {
        ParagraphChunker::new()
            .chunk(content, &ChunkConfig { chunk_size })
            .unwrap()
    }

    fn non_blank_lines(text: &str) -> Vec<String> {
        paragraphs(text).map(str::to_string).collect()
    }

    // ========== Basic Chunking Tests ==========

    #[test]
    fn test_empty_text_produces_no_chunks() {
        assert!(chunk(&ExtractedText::new(), 1000).is_empty());
        assert!(chunk(&doc("   \n\n  \t\n"), 1000).is_empty());
    }

    #[test]
    fn test_small_paragraphs_fit_in_one_chunk() {
        let content = doc("First paragraph.\nSecond paragraph.\nThird paragraph.");
        let chunks = chunk(&content, 1000);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "chunk_1");
        assert_eq!(
            chunks[0].text,
            "First paragraph.\n\nSecond paragraph.\n\nThird paragraph."
        );
        assert_eq!(chunks[0].page, None);
    }

    #[test]
    fn test_blank_lines_are_discarded() {
        let content = doc("alpha\n\n\n   \nbeta\n");
        let chunks = chunk(&content, 1000);
        assert_eq!(chunks[0].text, "alpha\n\nbeta");
    }

    #[test]
    fn test_flush_when_next_paragraph_does_not_fit() {
        // "aaaa" + "\n\n" + "bbbb" = 10 chars fits; adding "\n\n" + "cccc" = 16 does not
        let content = doc("aaaa\nbbbb\ncccc");
        let chunks = chunk(&content, 10);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaa\n\nbbbb");
        assert_eq!(chunks[0].id, "chunk_1");
        assert_eq!(chunks[1].text, "cccc");
        assert_eq!(chunks[1].id, "chunk_2");
    }

    #[test]
    fn test_exact_fit_is_appended() {
        let content = doc("aaaa\nbbbb");
        let chunks = chunk(&content, 10);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text.chars().count(), 10);
    }

    #[test]
    fn test_oversized_paragraph_is_emitted_whole() {
        let long = "x".repeat(2500);
        let content = doc(&format!("short\n{long}\ntail"));
        let chunks = chunk(&content, 1000);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "short");
        assert_eq!(chunks[1].text, long);
        assert_eq!(chunks[2].text, "tail");
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        // Each paragraph is 4 characters but 8 bytes
        let content = doc("éééé\nüüüü");
        let chunks = chunk(&content, 10);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let result = ParagraphChunker::new().chunk(&doc("text"), &ChunkConfig { chunk_size: 0 });
        assert!(matches!(result, Err(ChunkError::InvalidConfig(_))));
    }

    // ========== Page-Aware Tests ==========

    #[test]
    fn test_page_ids_restart_per_page() {
        let content = paged(&["aaaa\nbbbb\ncccc", "dddd"]);
        let chunks = chunk(&content, 10);

        let ids: Vec<&str> = chunks.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["page_1_chunk_1", "page_1_chunk_2", "page_2_chunk_1"]
        );
        assert_eq!(chunks[2].page, Some(2));
    }

    #[test]
    fn test_chunks_never_span_pages() {
        let content = paged(&["one", "two"]);
        let chunks = chunk(&content, 1000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "one");
        assert_eq!(chunks[1].text, "two");
    }

    #[test]
    fn test_skipped_pages_keep_their_numbers() {
        let mut content = ExtractedText::new();
        content.push(Some(1), "first");
        content.push(Some(2), "   ");
        content.push(Some(3), "third");
        let chunks = chunk(&content, 1000);

        assert_eq!(chunks[1].id, "page_3_chunk_1");
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id(None, 3), "chunk_3");
        assert_eq!(chunk_id(Some(12), 1), "page_12_chunk_1");
    }

    #[test]
    fn test_name() {
        assert_eq!(ParagraphChunker::default().name(), "paragraph");
    }

    // ========== Invariant Tests ==========

    fn line_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            3 => "[a-zA-Z0-9 .,]{1,120}",
            1 => "[ \t]{0,4}",
            1 => "[a-z]{300,1200}",
        ]
    }

    proptest! {
        #[test]
        fn prop_chunks_reconstruct_non_blank_lines(
            lines in prop::collection::vec(line_strategy(), 0..40),
            chunk_size in 20usize..1500,
        ) {
            let text = lines.join("\n");
            let chunks = chunk(&doc(&text), chunk_size);

            let rebuilt: Vec<String> = chunks
                .iter()
                .flat_map(|c| non_blank_lines(&c.text))
                .collect();
            prop_assert_eq!(rebuilt, non_blank_lines(&text));
        }

        #[test]
        fn prop_oversized_chunks_are_single_paragraphs(
            lines in prop::collection::vec(line_strategy(), 0..40),
            chunk_size in 20usize..1500,
        ) {
            let text = lines.join("\n");
            for c in chunk(&doc(&text), chunk_size) {
                if c.text.chars().count() > chunk_size {
                    prop_assert!(!c.text.contains(PARAGRAPH_SEPARATOR));
                }
            }
        }

        #[test]
        fn prop_rechunking_is_stable(
            lines in prop::collection::vec(line_strategy(), 0..40),
            chunk_size in 20usize..1500,
        ) {
            let text = lines.join("\n");
            let first = chunk(&doc(&text), chunk_size);
            let second = chunk(&doc(&text), chunk_size);
            prop_assert_eq!(first, second);
        }

        #[test]
        fn prop_ids_are_dense_and_sequential(
            lines in prop::collection::vec(line_strategy(), 0..40),
            chunk_size in 20usize..1500,
        ) {
            let text = lines.join("\n");
            for (i, c) in chunk(&doc(&text), chunk_size).iter().enumerate() {
                prop_assert_eq!(&c.id, &format!("chunk_{}", i + 1));
            }
        }
    }
}
