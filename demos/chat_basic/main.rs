//! # Chat Basic Demo
//!
//! Builds a session over a few in-memory documents, then asks a short
//! sequence of follow-up questions. Each answer shows which passages were
//! retrieved and how the conversation history grows.
//!
//! Uses `HashEmbeddingProvider` and a small prompt-inspecting generator so it
//! runs with **zero API keys**.
//!
//! Run: `cargo run -p docchat-demos --example chat_basic`

use std::sync::Arc;

use docchat_rag::{
    Document, GenerationRequest, Generator, HashEmbeddingProvider, RagConfig, Session,
};

// ---------------------------------------------------------------------------
// PromptSizeGenerator: reports what it was given instead of calling a model
// ---------------------------------------------------------------------------

struct PromptSizeGenerator;

#[async_trait::async_trait]
impl Generator for PromptSizeGenerator {
    async fn generate(&self, request: &GenerationRequest) -> docchat_rag::Result<String> {
        let prompt = request.render_prompt();
        let best = request.context.first().map(|c| c.trim()).unwrap_or_default();
        Ok(format!(
            "(prompt of {} chars, {} prior turn(s)) Most relevant passage: \"{best}\"",
            prompt.chars().count(),
            request.history.len(),
        ))
    }

    fn name(&self) -> &str {
        "prompt-size"
    }
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    // Small chunks so every document yields several passages.
    let config = RagConfig::builder().chunk_size(120).chunk_overlap(30).top_k(2).build()?;

    let session = Session::builder()
        .config(config)
        .embedding_provider(Arc::new(HashEmbeddingProvider::default()))
        .generator(Arc::new(PromptSizeGenerator))
        .build()?;

    let documents = vec![
        Document::new(
            "ownership.md",
            "Rust manages memory through ownership. Every value has a single owner, and the \
             value is dropped when its owner goes out of scope. Borrowing lets code use a \
             value without taking ownership, either shared or mutable but never both.",
        ),
        Document::new(
            "async.md",
            "Async Rust is built on futures. A future does nothing until it is polled by an \
             executor such as Tokio. The async and await keywords turn sequential-looking code \
             into state machines that yield while waiting for I/O.",
        ),
    ];

    let chunk_count = session.build_index(&documents).await?;
    println!("Indexed {chunk_count} chunk(s) from {} document(s).", documents.len());

    let questions = [
        "When is a value dropped?",
        "Can I have shared and mutable borrows at once?",
        "What polls a future?",
    ];

    for question in questions {
        println!("\nQ: {question}");
        let answer = session.answer_with_sources(question).await?;
        println!("A: {}", answer.text);
        for source in &answer.sources {
            println!(
                "   - {} #{} (score {:.3})",
                source.chunk.source_id, source.chunk.sequence_index, source.score
            );
        }
    }

    println!("\nConversation has {} turn(s).", session.history().await.len());
    Ok(())
}
