//! Document chunking for docrag.
//!
//! [`ParagraphChunker`] splits extracted text into bounded-size chunks along
//! paragraph boundaries and assigns each chunk a stable identifier.

pub mod paragraph;

pub use paragraph::{chunk_id, ParagraphChunker, PARAGRAPH_SEPARATOR};
