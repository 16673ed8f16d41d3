//! OpenAI embedding and chat providers.
//!
//! Both providers talk to any OpenAI-compatible server through one shared
//! JSON-over-HTTP client. This module is only available when the `openai`
//! feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::{GenerationRequest, Generator};

/// The default OpenAI API base URL.
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// Output size of `text-embedding-3-small`.
const DEFAULT_DIMENSIONS: usize = 1536;

const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Chat requests that take longer than this fail as a generation error.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You answer questions about the user's documents. \
    Use only the provided context. If the context does not contain the answer, \
    say that you don't know.";

/// Builds the error variant a caller reports failures as.
type ErrorFn = fn(String) -> RagError;

fn embedding_error(message: String) -> RagError {
    RagError::embedding("OpenAI", message)
}

fn generation_error(message: String) -> RagError {
    RagError::generation("OpenAI", message)
}

fn api_key_from_env(fail: ErrorFn) -> Result<String> {
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| fail("OPENAI_API_KEY environment variable not set".to_string()))
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn error_detail(body: String) -> String {
    serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error.message).unwrap_or(body)
}

// ── Shared client ──────────────────────────────────────────────────

/// Credentials and endpoint of one OpenAI-compatible server.
#[derive(Clone)]
struct ApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ApiClient {
    fn new(http: reqwest::Client, api_key: String, fail: ErrorFn) -> Result<Self> {
        if api_key.is_empty() {
            return Err(fail("API key must not be empty".to_string()));
        }
        Ok(Self { http, api_key, base_url: OPENAI_API_BASE.to_string() })
    }

    fn set_base_url(&mut self, base_url: String) {
        self.base_url = base_url.trim_end_matches('/').to_string();
    }

    /// POST `body` to `{base_url}/{path}` and decode the JSON reply.
    ///
    /// Transport errors, non-success statuses and undecodable bodies are all
    /// reported through `fail`.
    async fn post<B, R>(&self, path: &str, body: &B, fail: ErrorFn) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url);
        let response =
            self.http.post(&url).bearer_auth(&self.api_key).json(body).send().await.map_err(
                |e| {
                    error!(%url, error = %e, timeout = e.is_timeout(), "request failed");
                    fail(format!("request failed: {e}"))
                },
            )?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(%url, %status, "API error");
            return Err(fail(format!("API returned {status}: {}", error_detail(body))));
        }

        response.json().await.map_err(|e| {
            error!(%url, error = %e, "failed to parse response");
            fail(format!("malformed response: {e}"))
        })
    }
}

// ── Embeddings ─────────────────────────────────────────────────────

/// An [`EmbeddingProvider`] calling the `/embeddings` endpoint.
///
/// Defaults to `text-embedding-3-small` at 1536 dimensions. The key comes
/// from [`new`](Self::new) or `OPENAI_API_KEY`.
///
/// ```rust,ignore
/// use docchat_rag::openai::OpenAIEmbeddingProvider;
///
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(512);
/// let vectors = provider.embed_batch(&["first", "second"]).await?;
/// ```
pub struct OpenAIEmbeddingProvider {
    api: ApiClient,
    model: String,
    dimensions: usize,
    /// Sent with each request when the caller asked for shortened vectors.
    request_dimensions: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Ok(Self {
            api: ApiClient::new(reqwest::Client::new(), api_key.into(), embedding_error)?,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_DIMENSIONS,
            request_dimensions: None,
        })
    }

    /// Create a provider using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env(embedding_error)?)
    }

    /// Use another embedding model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the provider at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.set_base_url(base_url.into());
        self
    }

    /// Ask the server for vectors of `dims` components.
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.request_dimensions = Some(dims);
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .pop()
            .ok_or_else(|| embedding_error("API returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch_size = texts.len(), "requesting embeddings");

        let request =
            EmbeddingRequest { model: &self.model, input: texts, dimensions: self.request_dimensions };
        let mut response: EmbeddingResponse =
            self.api.post("embeddings", &request, embedding_error).await?;

        if response.data.len() != texts.len() {
            error!(expected = texts.len(), got = response.data.len(), "embedding count mismatch");
            return Err(embedding_error(format!(
                "API returned {} embeddings for {} inputs",
                response.data.len(),
                texts.len()
            )));
        }
        response.data.sort_by_key(|d| d.index);
        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ── Chat completions ───────────────────────────────────────────────

/// A [`Generator`] backed by the OpenAI chat-completions API.
///
/// The retrieved context goes into the system message, prior turns are
/// replayed as user/assistant messages, and the question is the final user
/// message.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::openai::OpenAIChatGenerator;
///
/// let generator = OpenAIChatGenerator::from_env()?.with_model("gpt-4o");
/// ```
pub struct OpenAIChatGenerator {
    api: ApiClient,
    model: String,
    temperature: f32,
}

impl OpenAIChatGenerator {
    /// Create a new generator with the given API key and the default model.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| generation_error(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            api: ApiClient::new(http, api_key.into(), generation_error)?,
            model: DEFAULT_CHAT_MODEL.to_string(),
            temperature: 0.0,
        })
    }

    /// Create a new generator using the `OPENAI_API_KEY` environment variable.
    pub fn from_env() -> Result<Self> {
        Self::new(api_key_from_env(generation_error)?)
    }

    /// Set the chat model name.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point the generator at an OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.set_base_url(base_url.into());
        self
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Debug, Serialize, PartialEq)]
struct ChatMessagePayload {
    role: &'static str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessagePayload>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
    refusal: Option<String>,
}

fn chat_messages(request: &GenerationRequest) -> Vec<ChatMessagePayload> {
    let mut messages = Vec::with_capacity(request.history.len() * 2 + 2);
    messages.push(ChatMessagePayload {
        role: "system",
        content: format!("{SYSTEM_PROMPT}\n\nContext:\n{}", request.context.join("\n\n")),
    });
    for turn in &request.history {
        messages.push(ChatMessagePayload { role: "user", content: turn.question.clone() });
        messages.push(ChatMessagePayload { role: "assistant", content: turn.answer.clone() });
    }
    messages.push(ChatMessagePayload { role: "user", content: request.question.clone() });
    messages
}

#[async_trait]
impl Generator for OpenAIChatGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        debug!(
            model = %self.model,
            context_chunks = request.context.len(),
            history_turns = request.history.len(),
            "requesting chat completion"
        );

        let body = ChatRequest {
            model: &self.model,
            messages: chat_messages(request),
            temperature: self.temperature,
        };
        let chat: ChatResponse = self.api.post("chat/completions", &body, generation_error).await?;

        let message = chat
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| generation_error("response contained no choices".to_string()))?;

        if let Some(refusal) = message.refusal {
            return Err(generation_error(format!("model refused: {refusal}")));
        }
        message
            .content
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| generation_error("response contained no content".to_string()))
    }

    fn name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ConversationTurn;

    #[test]
    fn empty_api_keys_are_rejected_with_matching_variants() {
        assert!(matches!(
            OpenAIEmbeddingProvider::new(""),
            Err(RagError::EmbeddingFailure { .. })
        ));
        assert!(matches!(OpenAIChatGenerator::new(""), Err(RagError::GenerationFailure { .. })));
    }

    #[test]
    fn base_url_drops_trailing_slashes() {
        let provider =
            OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.api.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn chat_messages_replay_history_before_question() {
        let request = GenerationRequest {
            context: vec!["ctx".into()],
            history: vec![ConversationTurn::new("q1", "a1")],
            question: "q2".into(),
        };
        let messages = chat_messages(&request);

        let roles: Vec<&str> = messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert!(messages[0].content.ends_with("Context:\nctx"));
        assert_eq!(messages[3].content, "q2");
    }

    #[test]
    fn error_detail_prefers_api_message() {
        let body = r#"{"error":{"message":"bad key"}}"#.to_string();
        assert_eq!(error_detail(body), "bad key");
        assert_eq!(error_detail("plain".to_string()), "plain");
    }

    #[tokio::test]
    async fn unreachable_server_maps_to_each_callers_error() {
        let provider =
            OpenAIEmbeddingProvider::new("sk-test").unwrap().with_base_url("http://127.0.0.1:9");
        assert!(matches!(provider.embed("text").await, Err(RagError::EmbeddingFailure { .. })));

        let generator =
            OpenAIChatGenerator::new("sk-test").unwrap().with_base_url("http://127.0.0.1:9");
        let request =
            GenerationRequest { context: Vec::new(), history: Vec::new(), question: "q".into() };
        assert!(matches!(
            generator.generate(&request).await,
            Err(RagError::GenerationFailure { .. })
        ));
    }
}
