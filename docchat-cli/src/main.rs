//! `docchat`: index a few documents and ask questions about them.

mod cli;
mod repl;
mod settings;
mod telemetry;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use docchat_rag::{
    DocumentSource, EmbeddingProvider, ExtractiveGenerator, FileSource, Generator,
    HashEmbeddingProvider, OpenAIChatGenerator, OpenAIEmbeddingProvider, RagConfig, Session,
    UrlSource,
};
use tracing::{error, info};

use crate::cli::{Cli, Provider};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    telemetry::init(cli.log_json);

    let config = settings::resolve(&cli)?;
    let session = Arc::new(build_session(&cli, config)?);

    let sources: Vec<Arc<dyn DocumentSource>> =
        cli.sources.iter().map(|location| source_for(location)).collect();
    let chunk_count =
        session.ingest(&sources).await.context("failed to build the document index")?;
    info!(sources = sources.len(), chunk_count, "ready");

    if cli.questions.is_empty() {
        return repl::run(session, cli.show_sources).await;
    }

    let mut failures = 0;
    for question in &cli.questions {
        match session.answer_with_sources(question).await {
            Ok(answer) => repl::print_answer(&answer, cli.show_sources),
            Err(e) => {
                error!(question = %question, error = %e, "question failed");
                eprintln!("error: {e}");
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{failures} of {} question(s) failed", cli.questions.len());
    }
    Ok(())
}

fn build_session(cli: &Cli, config: RagConfig) -> Result<Session> {
    let (embedding_provider, generator): (Arc<dyn EmbeddingProvider>, Arc<dyn Generator>) =
        match cli.provider {
            Provider::Offline => {
                (Arc::new(HashEmbeddingProvider::default()), Arc::new(ExtractiveGenerator))
            }
            Provider::Openai => {
                let mut embeddings = OpenAIEmbeddingProvider::from_env()?;
                let mut chat = OpenAIChatGenerator::from_env()?;
                if let Some(base_url) = &cli.base_url {
                    embeddings = embeddings.with_base_url(base_url);
                    chat = chat.with_base_url(base_url);
                }
                if let Some(model) = &cli.chat_model {
                    chat = chat.with_model(model);
                }
                (Arc::new(embeddings), Arc::new(chat))
            }
        };

    Ok(Session::builder()
        .config(config)
        .embedding_provider(embedding_provider)
        .generator(generator)
        .build()?)
}

fn source_for(location: &str) -> Arc<dyn DocumentSource> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Arc::new(UrlSource::new(location))
    } else {
        Arc::new(FileSource::new(location))
    }
}
