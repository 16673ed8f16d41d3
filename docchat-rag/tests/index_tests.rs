//! Tests for building and querying the in-memory vector index.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use docchat_rag::{
    Chunk, Chunker, Document, EmbeddingProvider, FixedSizeChunker, IndexOptions, RagError,
    VectorIndex,
};
use proptest::prelude::*;

/// Maps each known text to its own unit vector; unknown text maps to zero.
struct LookupEmbedder {
    positions: HashMap<String, usize>,
    dimensions: usize,
}

impl LookupEmbedder {
    fn new(texts: &[&str]) -> Self {
        let mut positions = HashMap::new();
        for text in texts {
            let next = positions.len();
            positions.entry(text.to_string()).or_insert(next);
        }
        let dimensions = positions.len().max(1);
        Self { positions, dimensions }
    }
}

#[async_trait]
impl EmbeddingProvider for LookupEmbedder {
    async fn embed(&self, text: &str) -> docchat_rag::Result<Vec<f32>> {
        let mut embedding = vec![0.0; self.dimensions];
        if let Some(position) = self.positions.get(text) {
            embedding[*position] = 1.0;
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "lookup"
    }
}

/// Counts characters into buckets, so overlapping text scores higher.
struct CharCountEmbedder;

#[async_trait]
impl EmbeddingProvider for CharCountEmbedder {
    async fn embed(&self, text: &str) -> docchat_rag::Result<Vec<f32>> {
        let mut embedding = vec![0.0; 64];
        for c in text.chars() {
            embedding[c as usize % 64] += 1.0;
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        64
    }

    fn name(&self) -> &str {
        "char-count"
    }
}

/// Fails the first `failures` calls, then behaves like [`CharCountEmbedder`].
struct FlakyEmbedder {
    failures: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedder {
    async fn embed(&self, text: &str) -> docchat_rag::Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(RagError::EmbeddingFailure {
                provider: "flaky".into(),
                message: "rate limited".into(),
            });
        }
        CharCountEmbedder.embed(text).await
    }

    fn dimensions(&self) -> usize {
        64
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Finishes later chunks first to exercise order reassembly.
struct ReverseDelayEmbedder {
    inner: LookupEmbedder,
}

#[async_trait]
impl EmbeddingProvider for ReverseDelayEmbedder {
    async fn embed(&self, text: &str) -> docchat_rag::Result<Vec<f32>> {
        let position = self.inner.positions.get(text).copied().unwrap_or(0);
        let delay = 100u64.saturating_sub(position as u64 * 10);
        tokio::time::sleep(Duration::from_millis(delay)).await;
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    fn name(&self) -> &str {
        "reverse-delay"
    }
}

/// Returns a vector whose length depends on the text.
struct RaggedEmbedder;

#[async_trait]
impl EmbeddingProvider for RaggedEmbedder {
    async fn embed(&self, text: &str) -> docchat_rag::Result<Vec<f32>> {
        Ok(vec![1.0; text.len().max(1)])
    }

    fn dimensions(&self) -> usize {
        0
    }

    fn name(&self) -> &str {
        "ragged"
    }
}

/// Like [`LookupEmbedder`] but with components large enough that squaring
/// them overflows `f32`.
struct HugeLookupEmbedder {
    inner: LookupEmbedder,
}

#[async_trait]
impl EmbeddingProvider for HugeLookupEmbedder {
    async fn embed(&self, text: &str) -> docchat_rag::Result<Vec<f32>> {
        let embedding = self.inner.embed(text).await?;
        Ok(embedding.into_iter().map(|x| x * 1e20).collect())
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions
    }

    fn name(&self) -> &str {
        "huge-lookup"
    }
}

/// Returns NaN for the text "bad", ones otherwise.
struct NanEmbedder;

#[async_trait]
impl EmbeddingProvider for NanEmbedder {
    async fn embed(&self, text: &str) -> docchat_rag::Result<Vec<f32>> {
        let value = if text == "bad" { f32::NAN } else { 1.0 };
        Ok(vec![value; 4])
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn name(&self) -> &str {
        "nan"
    }
}

fn chunks_of(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| Chunk {
            id: format!("doc_{i}"),
            text: text.to_string(),
            source_id: "doc".to_string(),
            sequence_index: i,
            metadata: HashMap::new(),
        })
        .collect()
}

#[tokio::test]
async fn windowed_chunks_are_retrievable_by_overlapping_text() {
    let chunker = FixedSizeChunker::new(8, 2).unwrap();
    let chunks = chunker.chunk(&Document::new("doc", "AAAA BBBB CCCC DDDD"));
    let index =
        VectorIndex::build(chunks, Arc::new(CharCountEmbedder), IndexOptions::default())
            .await
            .unwrap();

    let results = index.query("BB CCCC", 1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].chunk.sequence_index, 1);
    assert_eq!(results[0].chunk.text, "BBB CCCC");
}

#[tokio::test]
async fn unit_vector_stub_returns_the_queried_chunk() {
    let texts = ["AAAA BBB", "BBB CCCC", "CC DDDD"];
    let index = VectorIndex::build(
        chunks_of(&texts),
        Arc::new(LookupEmbedder::new(&texts)),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    let results = index.query("BBB CCCC", 1).await.unwrap();
    assert_eq!(results[0].chunk.id, "doc_1");
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn k_larger_than_index_is_clamped() {
    let texts = ["one", "two", "three"];
    let index = VectorIndex::build(
        chunks_of(&texts),
        Arc::new(LookupEmbedder::new(&texts)),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    let results = index.query("two", 10).await.unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].chunk.text, "two");
}

#[tokio::test]
async fn ties_keep_insertion_order() {
    let texts = ["alpha", "beta", "gamma", "delta"];
    let index = VectorIndex::build(
        chunks_of(&texts),
        Arc::new(LookupEmbedder::new(&texts)),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    // An unknown query scores zero against everything.
    let results = index.query("unknown", 4).await.unwrap();
    let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
    assert_eq!(ids, vec!["doc_0", "doc_1", "doc_2", "doc_3"]);
}

#[tokio::test]
async fn empty_index_query_fails() {
    let index = VectorIndex::build(Vec::new(), Arc::new(CharCountEmbedder), IndexOptions::default())
        .await
        .unwrap();

    assert!(index.is_empty());
    assert!(matches!(index.query("anything", 1).await, Err(RagError::EmptyIndex)));
    assert!(matches!(index.search_vector(&[0.0; 64], 1), Err(RagError::EmptyIndex)));
}

#[tokio::test]
async fn zero_k_is_invalid() {
    let index = VectorIndex::build(
        chunks_of(&["text"]),
        Arc::new(CharCountEmbedder),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    assert!(matches!(index.query("text", 0).await, Err(RagError::InvalidConfiguration(_))));
}

#[tokio::test]
async fn query_vector_dimension_must_match() {
    let index = VectorIndex::build(
        chunks_of(&["text"]),
        Arc::new(CharCountEmbedder),
        IndexOptions::default(),
    )
    .await
    .unwrap();

    assert_eq!(index.dimensions(), 64);
    assert!(matches!(index.search_vector(&[1.0; 3], 1), Err(RagError::EmbeddingFailure { .. })));
}

#[tokio::test]
async fn transient_embedding_failures_are_retried() {
    let provider = Arc::new(FlakyEmbedder { failures: 2, calls: AtomicUsize::new(0) });
    let options = IndexOptions { concurrency: 1, retries: 2 };

    let index = VectorIndex::build(chunks_of(&["only chunk"]), provider.clone(), options)
        .await
        .unwrap();

    assert_eq!(index.len(), 1);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn exhausted_retries_fail_the_whole_build() {
    let provider = Arc::new(FlakyEmbedder { failures: 5, calls: AtomicUsize::new(0) });
    let options = IndexOptions { concurrency: 1, retries: 1 };

    let err = VectorIndex::build(chunks_of(&["a", "b"]), provider, options).await.unwrap_err();
    match err {
        RagError::EmbeddingFailure { provider, message } => {
            assert_eq!(provider, "flaky");
            assert!(message.contains("doc_0"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn inconsistent_dimensions_fail_the_build() {
    let err = VectorIndex::build(
        chunks_of(&["short", "much longer text"]),
        Arc::new(RaggedEmbedder),
        IndexOptions::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, RagError::EmbeddingFailure { .. }));
}

#[tokio::test(start_paused = true)]
async fn concurrent_embedding_preserves_input_order() {
    let texts = ["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7"];
    let provider = Arc::new(ReverseDelayEmbedder { inner: LookupEmbedder::new(&texts) });
    let options = IndexOptions { concurrency: 4, retries: 0 };

    let index = VectorIndex::build(chunks_of(&texts), provider, options).await.unwrap();

    let stored: Vec<&str> = index.chunks().map(|c| c.text.as_str()).collect();
    assert_eq!(stored, texts.to_vec());
    for text in texts {
        let results = index.query(text, 1).await.unwrap();
        assert_eq!(results[0].chunk.text, text);
    }
}

#[tokio::test]
async fn large_components_still_rank_the_exact_match_first() {
    let texts = ["a", "b", "c"];
    let provider = Arc::new(HugeLookupEmbedder { inner: LookupEmbedder::new(&texts) });
    let index =
        VectorIndex::build(chunks_of(&texts), provider, IndexOptions::default()).await.unwrap();

    let results = index.query("c", 3).await.unwrap();
    assert_eq!(results[0].chunk.text, "c");
    assert!((results[0].score - 1.0).abs() < 1e-6);
    assert!(results.iter().all(|r| r.score.is_finite()));
}

#[tokio::test]
async fn non_finite_embeddings_fail_the_build() {
    let err = VectorIndex::build(
        chunks_of(&["good", "bad"]),
        Arc::new(NanEmbedder),
        IndexOptions::default(),
    )
    .await
    .unwrap_err();

    match err {
        RagError::EmbeddingFailure { provider, message } => {
            assert_eq!(provider, "nan");
            assert!(message.contains("doc_1"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_finite_query_vectors_are_rejected() {
    let index =
        VectorIndex::build(chunks_of(&["good"]), Arc::new(NanEmbedder), IndexOptions::default())
            .await
            .unwrap();

    let query = [f32::INFINITY, 0.0, 0.0, 0.0];
    assert!(matches!(index.search_vector(&query, 1), Err(RagError::EmbeddingFailure { .. })));
    assert!(matches!(index.query("bad", 1).await, Err(RagError::EmbeddingFailure { .. })));
}

mod prop_index_search {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(50))]

        /// Every indexed chunk is its own best match, results are sorted by
        /// descending score, and `k` is clamped to the index size.
        #[test]
        fn self_retrieval_ordering_and_clamping(
            texts in proptest::collection::vec("[a-z]{1,12}", 1..16),
            k in 1usize..24,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            let index = rt
                .block_on(VectorIndex::build(
                    chunks_of(&refs),
                    Arc::new(LookupEmbedder::new(&refs)),
                    IndexOptions::default(),
                ))
                .unwrap();

            for text in &texts {
                let top = rt.block_on(index.query(text, 1)).unwrap();
                prop_assert_eq!(&top[0].chunk.text, text);
            }

            let results = rt.block_on(index.query(&texts[0], k)).unwrap();
            prop_assert_eq!(results.len(), k.min(texts.len()));
            for window in results.windows(2) {
                prop_assert!(window[0].score >= window[1].score);
            }
        }
    }
}
