//! In-memory vector index using cosine similarity.
//!
//! A [`VectorIndex`] is built once from a closed set of chunks and is
//! immutable afterwards. It owns the [`EmbeddingProvider`] that produced its
//! vectors and reuses it for every query, so build-time and query-time
//! vectors always come from the same embedding function.

use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, error, info, warn};

use crate::config::{DEFAULT_EMBED_CONCURRENCY, DEFAULT_EMBED_RETRIES, RagConfig};
use crate::document::{Chunk, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Tuning knobs for [`VectorIndex::build`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Maximum number of embedding calls in flight.
    pub concurrency: usize,
    /// Retries allowed for each individual embedding call.
    pub retries: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self { concurrency: DEFAULT_EMBED_CONCURRENCY, retries: DEFAULT_EMBED_RETRIES }
    }
}

impl From<&RagConfig> for IndexOptions {
    fn from(config: &RagConfig) -> Self {
        Self { concurrency: config.embed_concurrency, retries: config.embed_retries }
    }
}

#[derive(Debug, Clone)]
struct IndexEntry {
    chunk: Chunk,
    embedding: Vec<f32>,
}

/// An immutable, in-memory nearest-neighbour index over embedded chunks.
///
/// Entries are kept in the order the chunks were supplied to
/// [`build`](VectorIndex::build). Queries scan every entry and break score
/// ties by that insertion order.
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use docchat_rag::{HashEmbeddingProvider, IndexOptions, VectorIndex};
///
/// let index = VectorIndex::build(chunks, Arc::new(HashEmbeddingProvider::default()),
///     IndexOptions::default()).await?;
/// let results = index.query("what is ownership?", 4).await?;
/// ```
pub struct VectorIndex {
    provider: Arc<dyn EmbeddingProvider>,
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("provider", &self.provider.name())
            .field("len", &self.entries.len())
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl VectorIndex {
    /// Embed every chunk and assemble the index.
    ///
    /// Embedding calls run concurrently, bounded by `options.concurrency`,
    /// and each call is retried up to `options.retries` times. Results are
    /// stored in input order regardless of completion order. The build is
    /// all-or-nothing: on failure no index is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`] if any embedding call still
    /// fails after its retries, or if the provider returns vectors that are
    /// empty, non-finite, or of inconsistent dimension.
    pub async fn build(
        chunks: Vec<Chunk>,
        provider: Arc<dyn EmbeddingProvider>,
        options: IndexOptions,
    ) -> Result<Self> {
        let concurrency = options.concurrency.max(1);
        debug!(
            provider = provider.name(),
            chunk_count = chunks.len(),
            concurrency,
            "embedding chunks"
        );

        let embeddings: Vec<Vec<f32>> = stream::iter(chunks.iter())
            .map(|chunk| embed_with_retry(provider.as_ref(), chunk, options.retries))
            .buffered(concurrency)
            .try_collect()
            .await?;

        let dimensions = match embeddings.first() {
            Some(first) => first.len(),
            None => provider.dimensions(),
        };
        if !embeddings.is_empty() && dimensions == 0 {
            error!(provider = provider.name(), "provider returned an empty embedding");
            return Err(RagError::embedding(provider.name(), "provider returned an empty vector"));
        }
        if let Some((chunk, _)) =
            chunks.iter().zip(&embeddings).find(|(_, embedding)| !all_finite(embedding))
        {
            error!(provider = provider.name(), chunk.id = %chunk.id, "non-finite embedding");
            return Err(RagError::embedding(
                provider.name(),
                format!("chunk '{}' has a non-finite embedding component", chunk.id),
            ));
        }
        if let Some((chunk, embedding)) =
            chunks.iter().zip(&embeddings).find(|(_, embedding)| embedding.len() != dimensions)
        {
            error!(
                provider = provider.name(),
                chunk.id = %chunk.id,
                expected = dimensions,
                got = embedding.len(),
                "embedding dimension mismatch"
            );
            return Err(RagError::embedding(
                provider.name(),
                format!(
                    "chunk '{}' has dimension {} but the index uses {dimensions}",
                    chunk.id,
                    embedding.len()
                ),
            ));
        }

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        info!(
            provider = provider.name(),
            chunk_count = entries.len(),
            dimensions,
            "built vector index"
        );

        Ok(Self { provider, entries, dimensions })
    }

    /// Embed `text` with the build-time provider and return the `k` most
    /// similar chunks in descending score order.
    ///
    /// `k` larger than the index is clamped to the index size.
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if the index holds no chunks
    /// - [`RagError::InvalidConfiguration`] if `k == 0`
    /// - [`RagError::EmbeddingFailure`] if the query cannot be embedded
    pub async fn query(&self, text: &str, k: usize) -> Result<Vec<SearchResult>> {
        self.check_query(k)?;

        let embedding = self.provider.embed(text).await.map_err(|e| {
            error!(provider = self.provider.name(), error = %e, "embedding failed during query");
            match e {
                RagError::EmbeddingFailure { .. } => e,
                other => RagError::embedding(self.provider.name(), other.to_string()),
            }
        })?;

        self.search_vector(&embedding, k)
    }

    /// Score a pre-computed query vector against every entry.
    ///
    /// Same ordering and clamping rules as [`query`](VectorIndex::query).
    ///
    /// # Errors
    ///
    /// - [`RagError::EmptyIndex`] if the index holds no chunks
    /// - [`RagError::InvalidConfiguration`] if `k == 0`
    /// - [`RagError::EmbeddingFailure`] if the vector's dimension differs
    ///   from the index or it holds a NaN or infinite component
    pub fn search_vector(&self, embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        self.check_query(k)?;
        if embedding.len() != self.dimensions {
            return Err(RagError::embedding(
                self.provider.name(),
                format!(
                    "query has dimension {} but the index uses {}",
                    embedding.len(),
                    self.dimensions
                ),
            ));
        }
        if !all_finite(embedding) {
            return Err(RagError::embedding(
                self.provider.name(),
                "query has a non-finite embedding component",
            ));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (position, cosine_similarity(&entry.embedding, embedding)))
            .collect();

        // `sort_by` is stable, so equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        debug!(k, returned = scored.len(), "vector search completed");

        Ok(scored
            .into_iter()
            .map(|(position, score)| SearchResult {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect())
    }

    fn check_query(&self, k: usize) -> Result<()> {
        if self.entries.is_empty() {
            return Err(RagError::EmptyIndex);
        }
        if k == 0 {
            return Err(RagError::InvalidConfiguration("k must be greater than zero".to_string()));
        }
        Ok(())
    }

    /// Number of indexed chunks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no chunks.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Dimension shared by every vector in the index.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Name of the embedding provider the index was built with.
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Indexed chunks in insertion order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }
}

async fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    chunk: &Chunk,
    retries: usize,
) -> Result<Vec<f32>> {
    let mut attempt = 0;
    loop {
        match provider.embed(&chunk.text).await {
            Ok(embedding) => return Ok(embedding),
            Err(e) if attempt < retries => {
                attempt += 1;
                warn!(
                    provider = provider.name(),
                    chunk.id = %chunk.id,
                    attempt,
                    error = %e,
                    "embedding failed, retrying"
                );
            }
            Err(e) => {
                error!(
                    provider = provider.name(),
                    chunk.id = %chunk.id,
                    error = %e,
                    "embedding failed during index build"
                );
                let message = match e {
                    RagError::EmbeddingFailure { message, .. } => message,
                    other => other.to_string(),
                };
                return Err(RagError::embedding(
                    provider.name(),
                    format!("chunk '{}': {message}", chunk.id),
                ));
            }
        }
    }
}

fn all_finite(embedding: &[f32]) -> bool {
    embedding.iter().all(|x| x.is_finite())
}

/// Compute cosine similarity between two vectors.
///
/// Sums are accumulated in `f64`, so any finite `f32` components give a
/// finite score. Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a.sqrt() * norm_b.sqrt())) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_parallel_vectors_is_one() {
        let score = cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_with_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_huge_components_stays_finite() {
        let v = [1e20f32, 0.0, 3e38];
        let score = cosine_similarity(&v, &v);
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn options_follow_config() {
        let config = RagConfig { embed_concurrency: 8, embed_retries: 0, ..RagConfig::default() };
        assert_eq!(IndexOptions::from(&config), IndexOptions { concurrency: 8, retries: 0 });
    }
}
