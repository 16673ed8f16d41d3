//! Answer generation trait and the request handed to generators.

use std::fmt::Write as _;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::memory::ConversationTurn;

/// Everything a generator needs to answer one question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationRequest {
    /// Retrieved chunk texts, most relevant first.
    pub context: Vec<String>,
    /// All prior turns of the conversation, oldest first.
    pub history: Vec<ConversationTurn>,
    /// The question to answer.
    pub question: String,
}

impl GenerationRequest {
    /// Render the request as a single completion-style prompt.
    ///
    /// The prompt contains the retrieved context, the chat history (omitted
    /// when empty), and the question, in that order.
    pub fn render_prompt(&self) -> String {
        let mut prompt = String::from(
            "Use the following pieces of context to answer the question at the end. \
             If you don't know the answer, just say that you don't know, \
             don't try to make up an answer.\n\n",
        );
        prompt.push_str(&self.context.join("\n\n"));
        prompt.push_str("\n\n");

        if !self.history.is_empty() {
            prompt.push_str("Chat history:\n");
            for turn in &self.history {
                let _ = writeln!(prompt, "Question: {}\nAnswer: {}", turn.question, turn.answer);
            }
            prompt.push('\n');
        }

        let _ = write!(prompt, "Question: {}\nHelpful Answer:", self.question);
        prompt
    }
}

/// A collaborator that turns a [`GenerationRequest`] into answer text.
///
/// Implementations may fail transiently; the responder reports any failure as
/// [`RagError::GenerationFailure`] and leaves the conversation memory
/// untouched.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce an answer for the request.
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// A short name identifying the generator, used in logs and errors.
    fn name(&self) -> &str;
}

/// An offline generator that answers with the most relevant passage.
///
/// Useful when no language model is configured: the answer is the top
/// retrieved chunk, trimmed.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractiveGenerator;

#[async_trait]
impl Generator for ExtractiveGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        request
            .context
            .first()
            .map(|passage| passage.trim().to_string())
            .ok_or_else(|| RagError::generation(self.name(), "no context was retrieved"))
    }

    fn name(&self) -> &str {
        "extractive"
    }
}
