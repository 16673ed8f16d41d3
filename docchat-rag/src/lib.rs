//! # docchat-rag
//!
//! Conversational retrieval-augmented generation over a set of documents.
//!
//! ## Overview
//!
//! The crate is organised leaf-first:
//!
//! - [`chunking`] splits document text into overlapping character windows
//! - [`index`] embeds chunks and answers nearest-neighbour queries
//! - [`memory`] records the question/answer turns of a conversation
//! - [`responder`] retrieves context, calls the generator, and records turns
//! - [`session`] ties one index and one memory together behind a two-phase API
//!
//! Embedding and generation models are collaborators behind the
//! [`EmbeddingProvider`] and [`Generator`] traits. [`HashEmbeddingProvider`]
//! and [`ExtractiveGenerator`] work offline; the `openai` feature adds
//! OpenAI-backed implementations, the `http` feature adds [`UrlSource`], and
//! the `pdf` feature lets [`FileSource`] extract text from PDF files.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docchat_rag::{
//!     Document, ExtractiveGenerator, HashEmbeddingProvider, RagConfig, Session,
//! };
//!
//! # async fn run() -> docchat_rag::Result<()> {
//! let session = Session::builder()
//!     .config(RagConfig::builder().chunk_size(500).chunk_overlap(100).build()?)
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
//!     .generator(Arc::new(ExtractiveGenerator))
//!     .build()?;
//!
//! session.build_index(&[Document::new("guide.txt", "Rust has no garbage collector.")]).await?;
//! let answer = session.answer("Does Rust have a garbage collector?").await?;
//! # Ok(())
//! # }
//! ```

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod memory;
#[cfg(feature = "openai")]
pub mod openai;
pub mod responder;
pub mod session;
pub mod source;

pub use chunking::{Chunker, FixedSizeChunker, split_text};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::{EmbeddingProvider, HashEmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::{ExtractiveGenerator, GenerationRequest, Generator};
pub use index::{IndexOptions, VectorIndex, cosine_similarity};
pub use memory::{ChatMessage, ConversationMemory, ConversationTurn, Role};
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatGenerator, OpenAIEmbeddingProvider};
pub use responder::{Answer, Responder};
pub use session::{Session, SessionBuilder};
#[cfg(feature = "http")]
pub use source::UrlSource;
pub use source::{DocumentSource, FileSource, TextSource};
