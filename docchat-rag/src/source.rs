//! Document sources: where raw text comes from.
//!
//! Sources deliver plain text. Files are read as UTF-8, except PDFs, whose
//! page text is extracted when the `pdf` feature is enabled. Anything else is
//! reported as [`RagError::IngestionFailure`].

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::document::Document;
use crate::error::{RagError, Result};

/// Something that can produce a [`Document`].
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Identifier recorded as the document's `source_id`.
    fn source_id(&self) -> &str;

    /// Load the document text.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::IngestionFailure`] if the source cannot be read.
    async fn load(&self) -> Result<Document>;
}

/// A document that is already in memory.
#[derive(Debug, Clone)]
pub struct TextSource {
    source_id: String,
    text: String,
}

impl TextSource {
    /// Wrap `text` under the given identifier.
    pub fn new(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), text: text.into() }
    }
}

#[async_trait]
impl DocumentSource for TextSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn load(&self) -> Result<Document> {
        Ok(Document::new(self.source_id.clone(), self.text.clone()))
    }
}

/// Leading bytes of every PDF file.
const PDF_MAGIC: &[u8] = b"%PDF-";

/// A text or PDF file on the local filesystem.
///
/// The format is detected from the file contents, not its extension. The
/// detected format is recorded under the `format` metadata key.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    source_id: String,
}

impl FileSource {
    /// Create a source for the file at `path`. The path is the source id.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let source_id = path.display().to_string();
        Self { path, source_id }
    }
}

#[async_trait]
impl DocumentSource for FileSource {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    async fn load(&self) -> Result<Document> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            error!(source_id = %self.source_id, error = %e, "failed to read file");
            RagError::ingestion(&self.source_id, format!("unreadable file: {e}"))
        })?;
        let (text, format) = if bytes.starts_with(PDF_MAGIC) {
            (pdf_text(&self.source_id, bytes).await?, "pdf")
        } else {
            let text = String::from_utf8(bytes).map_err(|_| {
                error!(source_id = %self.source_id, "file is not UTF-8 text");
                RagError::ingestion(&self.source_id, "unsupported format: file is not UTF-8 text")
            })?;
            (text, "text")
        };

        debug!(source_id = %self.source_id, format, chars = text.chars().count(), "loaded file");
        let file_name = self
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_id.clone());
        Ok(Document::new(self.source_id.clone(), text)
            .with_metadata("file_name", file_name)
            .with_metadata("format", format))
    }
}

/// Extract the text of every page, in page order.
///
/// Extraction is CPU-bound and may panic on malformed input, so it runs on
/// the blocking pool and a panic is reported like any other parse error.
#[cfg(feature = "pdf")]
async fn pdf_text(source_id: &str, bytes: Vec<u8>) -> Result<String> {
    let extracted = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| {
            error!(source_id, error = %e, "PDF extraction aborted");
            RagError::ingestion(source_id, format!("unreadable PDF: {e}"))
        })?;
    extracted.map_err(|e| {
        error!(source_id, error = %e, "PDF extraction failed");
        RagError::ingestion(source_id, format!("unreadable PDF: {e}"))
    })
}

#[cfg(not(feature = "pdf"))]
async fn pdf_text(source_id: &str, _bytes: Vec<u8>) -> Result<String> {
    error!(source_id, "PDF support is not enabled");
    Err(RagError::ingestion(source_id, "unsupported format: PDF requires the `pdf` feature"))
}

/// A document fetched over HTTP(S).
///
/// This type is only available when the `http` feature is enabled.
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct UrlSource {
    client: reqwest::Client,
    url: String,
}

#[cfg(feature = "http")]
impl UrlSource {
    /// Create a source for `url` with a default client.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    /// Create a source for `url` using an existing client.
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self { client, url: url.into() }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl DocumentSource for UrlSource {
    fn source_id(&self) -> &str {
        &self.url
    }

    async fn load(&self) -> Result<Document> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            error!(url = %self.url, error = %e, "request failed");
            RagError::ingestion(&self.url, format!("unreachable URL: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            error!(url = %self.url, %status, "unexpected status");
            return Err(RagError::ingestion(&self.url, format!("server returned {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(content_type) = &content_type {
            if !content_type.starts_with("text/") {
                error!(url = %self.url, content_type, "unsupported content type");
                return Err(RagError::ingestion(
                    &self.url,
                    format!("unsupported format: {content_type}"),
                ));
            }
        }

        let text = response.text().await.map_err(|e| {
            error!(url = %self.url, error = %e, "failed to read body");
            RagError::ingestion(&self.url, format!("failed to read body: {e}"))
        })?;

        debug!(url = %self.url, chars = text.chars().count(), "fetched document");
        let mut document = Document::new(self.url.clone(), text);
        if let Some(content_type) = content_type {
            document = document.with_metadata("content_type", content_type);
        }
        Ok(document)
    }
}
