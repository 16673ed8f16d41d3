use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Ask questions about your documents.
#[derive(Debug, Parser)]
#[command(name = "docchat", version, about)]
pub struct Cli {
    /// Text files, PDF files or http(s) URLs to ingest
    #[arg(required = true)]
    pub sources: Vec<String>,

    /// TOML file with chunking and retrieval settings
    #[arg(long, env = "DOCCHAT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum chunk size in characters
    #[arg(long, env = "DOCCHAT_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "DOCCHAT_CHUNK_OVERLAP")]
    pub chunk_overlap: Option<usize>,

    /// Chunks retrieved per question
    #[arg(long, env = "DOCCHAT_TOP_K")]
    pub top_k: Option<usize>,

    /// Embedding and generation backend
    #[arg(long, value_enum, default_value_t = Provider::Offline, env = "DOCCHAT_PROVIDER")]
    pub provider: Provider,

    /// Chat model used with the openai provider
    #[arg(long, env = "DOCCHAT_CHAT_MODEL")]
    pub chat_model: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub base_url: Option<String>,

    /// Ask these questions and exit instead of starting a prompt
    #[arg(short, long = "question")]
    pub questions: Vec<String>,

    /// Print the retrieved passages under each answer
    #[arg(long)]
    pub show_sources: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Provider {
    /// Hashed trigram embeddings and extractive answers; needs no network
    Offline,
    /// OpenAI embeddings and chat completions; needs OPENAI_API_KEY
    Openai,
}
