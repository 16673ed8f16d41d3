//! Document chunking.
//!
//! This module provides the [`Chunker`] trait and [`FixedSizeChunker`], which
//! splits text into overlapping windows measured in characters (Unicode scalar
//! values). Windowing is a pure function of `(text, chunk_size, chunk_overlap)`.

use crate::config::validate_chunking;
use crate::document::{Chunk, Document};
use crate::error::Result;

/// A strategy for splitting documents into chunks.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    ///
    /// Returns an empty `Vec` if the document has empty text.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Split several documents, concatenating their chunks in document order.
    ///
    /// Chunk boundaries never cross a document boundary.
    fn chunk_all(&self, documents: &[Document]) -> Vec<Chunk> {
        documents.iter().flat_map(|document| self.chunk(document)).collect()
    }
}

/// Splits text into fixed-size character windows with a configurable overlap.
///
/// Chunk IDs are generated as `{source_id}_{sequence_index}`. Each chunk
/// inherits the parent document's metadata.
///
/// # Example
///
/// ```rust
/// use docchat_rag::{Chunker, Document, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(8, 2).unwrap();
/// let chunks = chunker.chunk(&Document::new("notes.txt", "AAAA BBBB CCCC DDDD"));
/// assert_eq!(chunks[0].text, "AAAA BBB");
/// assert_eq!(chunks[1].text, "BBB CCCC");
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`](crate::RagError::InvalidConfiguration)
    /// if `chunk_size == 0` or `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate_chunking(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum number of characters per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of characters shared by consecutive chunks.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        windows(&document.text, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(sequence_index, text)| Chunk {
                id: format!("{}_{sequence_index}", document.source_id),
                text: text.to_string(),
                source_id: document.source_id.clone(),
                sequence_index,
                metadata: document.metadata.clone(),
            })
            .collect()
    }
}

/// Split `text` into overlapping character windows.
///
/// Windows are `chunk_size` characters long and start every
/// `chunk_size - chunk_overlap` characters. Splitting stops at the first
/// window that reaches the end of the text, so the last window may be shorter
/// and no window lies entirely inside its predecessor.
///
/// # Errors
///
/// Returns [`RagError::InvalidConfiguration`](crate::RagError::InvalidConfiguration)
/// if `chunk_size == 0` or `chunk_overlap >= chunk_size`.
pub fn split_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Result<Vec<String>> {
    validate_chunking(chunk_size, chunk_overlap)?;
    Ok(windows(text, chunk_size, chunk_overlap).into_iter().map(str::to_string).collect())
}

/// Windowing over validated parameters, borrowing from `text`.
fn windows(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every character start, plus the end of the text.
    let boundaries: Vec<usize> =
        text.char_indices().map(|(offset, _)| offset).chain(std::iter::once(text.len())).collect();
    let char_count = boundaries.len() - 1;
    let step = chunk_size - chunk_overlap;

    let mut windows = Vec::with_capacity(char_count.div_ceil(step));
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        windows.push(&text[boundaries[start]..boundaries[end]]);
        if end == char_count {
            break;
        }
        start += step;
    }
    windows
}
