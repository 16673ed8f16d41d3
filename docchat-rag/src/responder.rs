//! Retrieval-augmented responder.
//!
//! The [`Responder`] answers one question at a time: retrieve the `top_k`
//! most relevant chunks, combine them with the conversation so far, ask the
//! [`Generator`] for an answer, and record the turn only once generation has
//! succeeded.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, Generator};
use crate::index::VectorIndex;
use crate::memory::{ConversationMemory, ConversationTurn};

/// An answer together with the chunks it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// The generated answer text.
    pub text: String,
    /// Retrieved chunks, most relevant first.
    pub sources: Vec<SearchResult>,
}

/// Orchestrates retrieval and generation for a session.
///
/// The responder holds no conversation state of its own. The index and the
/// memory are passed in by the owning [`Session`](crate::Session); the index
/// is only read.
pub struct Responder {
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl Responder {
    /// Create a responder retrieving `top_k` chunks per question.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidConfiguration`] if `top_k == 0`.
    pub fn new(generator: Arc<dyn Generator>, top_k: usize) -> Result<Self> {
        if top_k == 0 {
            return Err(RagError::InvalidConfiguration(
                "top_k must be greater than zero".to_string(),
            ));
        }
        Ok(Self { generator, top_k })
    }

    /// Number of chunks retrieved per question.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Return a reference to the generator.
    pub fn generator(&self) -> &Arc<dyn Generator> {
        &self.generator
    }

    /// Answer `question`, returning only the answer text.
    ///
    /// See [`answer_with_sources`](Responder::answer_with_sources).
    pub async fn answer(
        &self,
        index: Option<&VectorIndex>,
        memory: &mut ConversationMemory,
        question: &str,
    ) -> Result<String> {
        Ok(self.answer_with_sources(index, memory, question).await?.text)
    }

    /// Answer `question` and return the retrieved chunks alongside the text.
    ///
    /// The question is trimmed before use. On success the turn
    /// `{question, answer}` is appended to `memory`.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoIndexBuilt`] if `index` is `None`
    /// - [`RagError::EmptyQuestion`] if the question is blank
    /// - any retrieval error from [`VectorIndex::query`]
    /// - [`RagError::GenerationFailure`] if the generator fails; `memory` is
    ///   left unchanged
    pub async fn answer_with_sources(
        &self,
        index: Option<&VectorIndex>,
        memory: &mut ConversationMemory,
        question: &str,
    ) -> Result<Answer> {
        let index = index.ok_or(RagError::NoIndexBuilt)?;
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let sources = index.query(question, self.top_k).await?;
        debug!(retrieved = sources.len(), "retrieved context");

        let request = GenerationRequest {
            context: sources.iter().map(|result| result.chunk.text.clone()).collect(),
            history: memory.history().to_vec(),
            question: question.to_string(),
        };

        let text = self.generator.generate(&request).await.map_err(|e| {
            error!(generator = self.generator.name(), error = %e, "generation failed");
            match e {
                RagError::GenerationFailure { .. } => e,
                other => RagError::generation(self.generator.name(), other.to_string()),
            }
        })?;

        memory.append(ConversationTurn::new(question, text.clone()));
        info!(
            generator = self.generator.name(),
            turn = memory.len(),
            sources = sources.len(),
            "answered question"
        );

        Ok(Answer { text, sources })
    }
}
