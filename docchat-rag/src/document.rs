//! Data types for documents, chunks, and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A source document containing extracted text and metadata.
///
/// Documents only live until they are chunked; the index keeps the chunks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Opaque identifier of the source, usually a file name or URL.
    pub source_id: String,
    /// The plain text content of the document.
    pub text: String,
    /// Key-value metadata copied onto every chunk of this document.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), text: text.into(), metadata: HashMap::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous window of a [`Document`]'s text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Unique identifier, `{source_id}_{sequence_index}`.
    pub id: String,
    /// The text content of the chunk.
    pub text: String,
    /// The source identifier of the parent [`Document`].
    pub source_id: String,
    /// Position of this chunk within its source, starting at zero.
    pub sequence_index: usize,
    /// Metadata inherited from the parent document.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The cosine similarity score (higher is more relevant).
    pub score: f32,
}
