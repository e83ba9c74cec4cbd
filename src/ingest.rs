//! Ingestion pipeline orchestration.
//!
//! One request moves through a fixed sequence of stages — filename
//! validation, streamed staging, format gate, text extraction, embedding —
//! and terminates at the first failure. Each stage's failure carries its own
//! error kind so the HTTP surface can answer with a precise status. Nothing
//! is retried and nothing is rolled back: a file staged before a later stage
//! fails stays on disk.

use crate::embedding::{EmbeddingClient, EmbeddingError};
use crate::extract::{self, ExtractError};
use crate::formats;
use crate::metrics::{IngestMetrics, MetricsSnapshot};
use crate::storage::{self, SinkError};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// One inbound upload, owned by the orchestrator for the request's duration.
pub struct UploadRequest<'a> {
    /// Filename declared by the client, if any.
    pub filename: Option<String>,
    /// Content type declared by the client. Advisory only; the format gate
    /// trusts the file extension, not this header.
    pub content_type: String,
    /// The upload body as an ordered byte stream of unknown total size.
    pub stream: BoxStream<'a, io::Result<Bytes>>,
}

/// Result of a fully ingested upload.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    /// Sanitized filename the upload was staged under.
    pub filename: String,
    /// Content type as declared by the client.
    pub content_type: String,
    /// Exact number of bytes received and written.
    pub size_bytes: u64,
    /// Embedding vector computed from the extracted text.
    pub embedding: Vec<f32>,
}

/// Errors emitted by the ingestion pipeline, one kind per failing stage.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The request was malformed before any filesystem work happened.
    #[error("invalid upload request: {0}")]
    InvalidRequest(String),
    /// Staging the upload to disk failed.
    #[error("failed to stage upload: {0}")]
    IoWrite(#[source] SinkError),
    /// The file's extension is not in the format registry.
    #[error("unsupported file type for extraction: '{extension}'")]
    UnsupportedFormat {
        /// The offending lowercased extension (or whole name, when dotless).
        extension: String,
    },
    /// The extraction variant failed on the staged file.
    #[error("failed to extract document text: {0}")]
    Extraction(#[source] ExtractError),
    /// The embedding backend failed on the extracted text.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Abstraction over the ingestion pipeline used by the HTTP surface.
#[async_trait]
pub trait IngestApi: Send + Sync {
    /// Run one upload through the full pipeline.
    async fn ingest(&self, request: UploadRequest<'_>) -> Result<IngestOutcome, IngestError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Coordinates the full ingestion pipeline: staging, format gating,
/// extraction, and embedding.
///
/// The service owns long-lived handles to the staging directory and the
/// embedding client; collaborators are injected at construction rather than
/// reached through ambient state. Construct it once near process start and
/// share it through an `Arc`.
pub struct IngestService {
    upload_dir: PathBuf,
    embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    metrics: Arc<IngestMetrics>,
}

impl IngestService {
    /// Build a service staging uploads under `upload_dir`, creating the
    /// directory if it does not exist yet.
    pub fn new(
        upload_dir: PathBuf,
        embedding_client: Box<dyn EmbeddingClient + Send + Sync>,
    ) -> io::Result<Self> {
        std::fs::create_dir_all(&upload_dir)?;
        Ok(Self {
            upload_dir,
            embedding_client,
            metrics: Arc::new(IngestMetrics::new()),
        })
    }

    /// Build the service from the process configuration.
    pub fn from_config() -> io::Result<Self> {
        let config = crate::config::get_config();
        Self::new(
            config.upload_dir.clone(),
            crate::embedding::get_embedding_client(),
        )
    }

    async fn run(&self, request: UploadRequest<'_>) -> Result<IngestOutcome, IngestError> {
        let declared = request.filename.as_deref().map(str::trim).unwrap_or("");
        if declared.is_empty() {
            return Err(IngestError::InvalidRequest(
                "uploaded file must include a filename".to_string(),
            ));
        }
        let filename = storage::sanitize_filename(declared)
            .map_err(|err| IngestError::InvalidRequest(err.to_string()))?;

        tracing::info!(
            filename = %filename,
            content_type = %request.content_type,
            "Processing upload"
        );

        let stored = storage::store(&self.upload_dir, &filename, request.stream)
            .await
            .map_err(IngestError::IoWrite)?;
        self.metrics.record_file_stored();

        let extension = derive_extension(&filename);
        if !formats::is_supported(&extension) {
            tracing::info!(
                filename = %filename,
                extension = %extension,
                "Rejecting unsupported format; staged file retained"
            );
            return Err(IngestError::UnsupportedFormat { extension });
        }

        self.metrics.record_extraction_attempt();
        let content = extract::extract(&stored.path, &extension)
            .await
            .map_err(|err| match err {
                ExtractError::Unsupported(extension) => {
                    IngestError::UnsupportedFormat { extension }
                }
                other => IngestError::Extraction(other),
            })?;

        self.metrics.record_embedding_attempt();
        let embedding = self.embedding_client.embed(&content.text).await?;

        self.metrics.record_completed();
        tracing::info!(
            filename = %filename,
            size_bytes = stored.size_bytes,
            dimension = embedding.len(),
            "Upload ingested"
        );

        Ok(IngestOutcome {
            filename,
            content_type: request.content_type,
            size_bytes: stored.size_bytes,
            embedding,
        })
    }
}

/// The lowercased text after the final dot; dotless names pass through whole
/// and fail the format gate with the full name reported.
fn derive_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, extension)| extension)
        .unwrap_or(filename)
        .to_ascii_lowercase()
}

#[async_trait]
impl IngestApi for IngestService {
    async fn ingest(&self, request: UploadRequest<'_>) -> Result<IngestOutcome, IngestError> {
        let outcome = self.run(request).await;
        if outcome.is_err() {
            self.metrics.record_failed();
        }
        outcome
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
