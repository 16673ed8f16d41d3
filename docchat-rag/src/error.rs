//! Error types for the `docchat-rag` crate.

use thiserror::Error;

/// Errors that can occur while ingesting documents or answering questions.
///
/// Every variant is local to the operation that raised it. A failed
/// operation never invalidates a previously built index or the recorded
/// conversation history.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking, retrieval, or pipeline parameters are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A document could not be loaded from its source.
    #[error("Ingestion failed ({source_id}): {message}")]
    IngestionFailure {
        /// The file path or URL that failed to load.
        source_id: String,
        /// A description of the failure.
        message: String,
    },

    /// An embedding call failed or returned an unusable vector.
    #[error("Embedding failed ({provider}): {message}")]
    EmbeddingFailure {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A query was issued against an index holding zero chunks.
    #[error("Index is empty")]
    EmptyIndex,

    /// A question was asked before any index was built for the session.
    #[error("No index has been built for this session")]
    NoIndexBuilt,

    /// The question was empty after trimming whitespace.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The generation collaborator failed to produce an answer.
    #[error("Generation failed ({generator}): {message}")]
    GenerationFailure {
        /// The generator that produced the error.
        generator: String,
        /// A description of the failure.
        message: String,
    },
}

impl RagError {
    pub(crate) fn ingestion(source_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IngestionFailure { source_id: source_id.into(), message: message.into() }
    }

    pub(crate) fn embedding(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingFailure { provider: provider.into(), message: message.into() }
    }

    pub(crate) fn generation(generator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationFailure { generator: generator.into(), message: message.into() }
    }
}

/// A convenience result type for pipeline operations.
pub type Result<T> = std::result::Result<T, RagError>;
