//! Chat session: one index, one conversation.
//!
//! A [`Session`] owns the state of a single conversation over a document set.
//! Ingestion and answering are two explicit phases:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docchat_rag::{Document, ExtractiveGenerator, HashEmbeddingProvider, RagConfig, Session};
//!
//! let session = Session::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .generator(Arc::new(ExtractiveGenerator))
//!     .build()?;
//!
//! session.build_index(&[Document::new("notes.txt", text)]).await?;
//! let answer = session.answer("What does the document say about X?").await?;
//! ```

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::config::RagConfig;
use crate::document::Document;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::Generator;
use crate::index::{IndexOptions, VectorIndex};
use crate::memory::{ConversationMemory, ConversationTurn};
use crate::responder::{Answer, Responder};
use crate::source::DocumentSource;

/// The state of one conversation: the current index and its memory.
///
/// `Session` is `Send + Sync` and may be shared behind an `Arc`. Answers are
/// serialised: the memory lock is held for the whole of one
/// [`answer`](Session::answer) call, so turns are recorded in the order they
/// complete and every question sees all earlier turns. A failed operation
/// never disturbs the committed index or history.
pub struct Session {
    config: RagConfig,
    chunker: Arc<dyn Chunker>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    responder: Responder,
    index: RwLock<Option<Arc<VectorIndex>>>,
    memory: Mutex<ConversationMemory>,
}

impl Session {
    /// Create a new [`SessionBuilder`].
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    /// Return a reference to the session configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Load every source and build a fresh index from the documents.
    ///
    /// Sources are loaded in order; the first failure aborts ingestion and
    /// leaves the previous index in place.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestionFailure`] if a source cannot be loaded,
    /// or any error from [`build_index`](Session::build_index).
    pub async fn ingest(&self, sources: &[Arc<dyn DocumentSource>]) -> Result<usize> {
        let mut documents = Vec::with_capacity(sources.len());
        for source in sources {
            let document = source.load().await.map_err(|e| {
                error!(source_id = source.source_id(), error = %e, "ingestion aborted");
                match e {
                    RagError::IngestionFailure { .. } => e,
                    other => RagError::ingestion(source.source_id(), other.to_string()),
                }
            })?;
            documents.push(document);
        }
        self.build_index(&documents).await
    }

    /// Chunk and embed `documents`, then install the result as the session index.
    ///
    /// On success the previous index is replaced and the conversation starts
    /// over with an empty memory. On failure nothing changes. Returns the
    /// number of indexed chunks.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingFailure`] if the index cannot be built.
    pub async fn build_index(&self, documents: &[Document]) -> Result<usize> {
        let chunks = self.chunker.chunk_all(documents);
        let chunk_count = chunks.len();

        let index = VectorIndex::build(
            chunks,
            Arc::clone(&self.embedding_provider),
            IndexOptions::from(&self.config),
        )
        .await?;

        // Lock order matches `answer`: memory first, then index.
        let mut memory = self.memory.lock().await;
        *self.index.write().await = Some(Arc::new(index));
        *memory = ConversationMemory::new();

        info!(document_count = documents.len(), chunk_count, "session index ready");
        Ok(chunk_count)
    }

    /// Answer a question against the current index.
    ///
    /// # Errors
    ///
    /// See [`Responder::answer_with_sources`].
    pub async fn answer(&self, question: &str) -> Result<String> {
        Ok(self.answer_with_sources(question).await?.text)
    }

    /// Answer a question and return the retrieved chunks with the answer.
    ///
    /// # Errors
    ///
    /// See [`Responder::answer_with_sources`].
    pub async fn answer_with_sources(&self, question: &str) -> Result<Answer> {
        let mut memory = self.memory.lock().await;
        let index = self.index.read().await.clone();
        self.responder.answer_with_sources(index.as_deref(), &mut memory, question).await
    }

    /// A snapshot of the conversation so far, oldest turn first.
    pub async fn history(&self) -> Vec<ConversationTurn> {
        self.memory.lock().await.history().to_vec()
    }

    /// The current index, if one has been built.
    pub async fn index(&self) -> Option<Arc<VectorIndex>> {
        self.index.read().await.clone()
    }

    /// Whether an index has been built for this session.
    pub async fn has_index(&self) -> bool {
        self.index.read().await.is_some()
    }
}

/// Builder for constructing a [`Session`].
///
/// `embedding_provider` and `generator` are required. The configuration
/// defaults to [`RagConfig::default`] and the chunker to a
/// [`FixedSizeChunker`] derived from it.
#[derive(Default)]
pub struct SessionBuilder {
    config: Option<RagConfig>,
    chunker: Option<Arc<dyn Chunker>>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generator: Option<Arc<dyn Generator>>,
}

impl SessionBuilder {
    /// Set the session configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default fixed-size chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the answer generator.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`Session`], validating the configuration first.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if the configuration is
    /// inconsistent or a required collaborator is missing.
    pub fn build(self) -> Result<Session> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            RagError::InvalidConfiguration("embedding_provider is required".to_string())
        })?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::InvalidConfiguration("generator is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        let responder = Responder::new(generator, config.top_k)?;

        Ok(Session {
            config,
            chunker,
            embedding_provider,
            responder,
            index: RwLock::new(None),
            memory: Mutex::new(ConversationMemory::new()),
        })
    }
}
