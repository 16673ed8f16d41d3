//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it.
///
/// A [`VectorIndex`](crate::VectorIndex) keeps the provider it was built with
/// and uses it for every query, so all vectors in one index come from the
/// same provider.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// The default implementation calls [`embed`](EmbeddingProvider::embed)
    /// sequentially for each input.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// A short name identifying the provider and model, used in logs and errors.
    fn name(&self) -> &str;
}

/// A deterministic, offline embedding provider.
///
/// Each text is hashed into a set of character trigram buckets, producing an
/// L2-normalised bag-of-trigrams vector. Texts that share substrings score
/// higher than unrelated texts, which is enough for demos, tests, and
/// working without network access. Identical text always yields an identical
/// vector.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
}

impl HashEmbeddingProvider {
    /// Default dimensionality of the hashed vectors.
    pub const DEFAULT_DIMENSIONS: usize = 256;

    /// Create a provider producing vectors of the given dimension.
    ///
    /// A dimension of zero is raised to one.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions: dimensions.max(1) }
    }

    fn bucket(&self, gram: &[char]) -> usize {
        // FNV-1a over the lowercase characters of the gram.
        let hash = gram
            .iter()
            .flat_map(|c| c.to_lowercase())
            .fold(0xcbf2_9ce4_8422_2325u64, |acc, c| {
                (acc ^ u64::from(c)).wrapping_mul(0x0000_0100_0000_01b3)
            });
        (hash % self.dimensions as u64) as usize
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let chars: Vec<char> = text.chars().collect();
        let mut embedding = vec![0.0f32; self.dimensions];

        if chars.len() < 3 {
            if !chars.is_empty() {
                embedding[self.bucket(&chars)] += 1.0;
            }
        } else {
            for gram in chars.windows(3) {
                embedding[self.bucket(gram)] += 1.0;
            }
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "hash-trigram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_embeddings_are_deterministic_and_normalised() {
        let provider = HashEmbeddingProvider::new(64);
        let a = provider.embed("the quick brown fox").await.unwrap();
        let b = provider.embed("the quick brown fox").await.unwrap();

        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn empty_text_embeds_to_zero_vector() {
        let provider = HashEmbeddingProvider::new(8);
        let embedding = provider.embed("").await.unwrap();
        assert!(embedding.iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn default_batch_preserves_order() {
        let provider = HashEmbeddingProvider::default();
        let batch = provider.embed_batch(&["alpha", "beta"]).await.unwrap();
        assert_eq!(batch[0], provider.embed("alpha").await.unwrap());
        assert_eq!(batch[1], provider.embed("beta").await.unwrap());
    }
}
