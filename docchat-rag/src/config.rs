//! Configuration for chunking, indexing, and retrieval.

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default maximum chunk size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;
/// Default overlap between consecutive chunks in characters.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
/// Default number of chunks retrieved per question.
pub const DEFAULT_TOP_K: usize = 4;
/// Default number of embedding calls in flight during an index build.
pub const DEFAULT_EMBED_CONCURRENCY: usize = 4;
/// Default number of retries for a single failed embedding call.
pub const DEFAULT_EMBED_RETRIES: usize = 2;

/// Configuration parameters for a chat session.
///
/// Every field has a default, so a partial TOML or JSON document
/// deserializes into a complete configuration. Call
/// [`validate`](RagConfig::validate) before using a deserialized value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved for each question.
    pub top_k: usize,
    /// Maximum number of concurrent embedding calls while building an index.
    pub embed_concurrency: usize,
    /// How many times a failed embedding call is retried before the build fails.
    pub embed_retries: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            embed_concurrency: DEFAULT_EMBED_CONCURRENCY,
            embed_retries: DEFAULT_EMBED_RETRIES,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Check that the parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `embed_concurrency == 0`
    pub fn validate(&self) -> Result<()> {
        validate_chunking(self.chunk_size, self.chunk_overlap)?;
        if self.top_k == 0 {
            return Err(RagError::InvalidConfiguration(
                "top_k must be greater than zero".to_string(),
            ));
        }
        if self.embed_concurrency == 0 {
            return Err(RagError::InvalidConfiguration(
                "embed_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Check a `(chunk_size, chunk_overlap)` pair.
pub(crate) fn validate_chunking(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidConfiguration(
            "chunk_size must be greater than zero".to_string(),
        ));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidConfiguration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the maximum number of concurrent embedding calls.
    pub fn embed_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embed_concurrency = concurrency;
        self
    }

    /// Set the per-call embedding retry count.
    pub fn embed_retries(mut self, retries: usize) -> Self {
        self.config.embed_retries = retries;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] under the conditions listed
    /// on [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
