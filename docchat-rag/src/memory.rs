//! Append-only conversation memory.

use serde::{Deserialize, Serialize};

/// One completed question/answer exchange.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    /// The question as asked by the user.
    pub question: String,
    /// The answer returned by the generator.
    pub answer: String,
}

impl ConversationTurn {
    /// Create a turn from a question and its answer.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// Who authored a message in the flattened history.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A question from the user.
    Question,
    /// An answer from the generator.
    Answer,
}

/// A single role-tagged message, as replayed to chat-style generators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    /// The author of the message.
    pub role: Role,
    /// The message text.
    pub text: String,
}

/// The ordered log of turns for one session.
///
/// Turns can only be appended. Nothing removes, edits, or reorders a recorded
/// turn, so [`history`](ConversationMemory::history) is always in
/// chronological order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationMemory {
    turns: Vec<ConversationTurn>,
}

impl ConversationMemory {
    /// Create an empty memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed turn.
    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// All recorded turns, oldest first.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Number of recorded turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether no turn has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The history flattened into alternating question and answer messages.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .flat_map(|turn| {
                [
                    ChatMessage { role: Role::Question, text: turn.question.clone() },
                    ChatMessage { role: Role::Answer, text: turn.answer.clone() },
                ]
            })
            .collect()
    }
}
