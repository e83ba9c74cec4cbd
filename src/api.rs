//! HTTP surface for docvec.
//!
//! This module exposes a compact Axum router with a handful of endpoints:
//!
//! - `POST /upload` – Accept a multipart document upload, stage it to disk,
//!   extract its text, and return the embedding vector alongside the stored
//!   byte size (`201 Created`).
//! - `GET /health` – Liveness plus a backing-store reachability probe.
//! - `GET /metrics` – Observe ingestion counters.
//! - `GET /commands` – Machine-readable command catalog for quick discovery
//!   by tools/hosts.
//!
//! # Error contract
//!
//! Every failure answers with a JSON body naming the failing pipeline stage:
//!
//! ```json
//! { "error": { "code": "unsupported_format", "message": "…" } }
//! ```
//!
//! Codes: `invalid_request` (400), `unsupported_format` (400), `io_write`
//! (500), `extraction` (500), `embedding` (502). Clients never receive a raw
//! internal trace.

use crate::ingest::{IngestApi, IngestError, IngestOutcome, UploadRequest};
use crate::metrics::MetricsSnapshot;
use crate::pool::StoreHealth;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::io;
use std::sync::Arc;

/// Build the HTTP router exposing the ingestion API surface.
///
/// The router is generic over the pipeline and the store probe so tests can
/// drive it with stubs; the upload body limit is disabled because uploads may
/// be arbitrarily large (memory stays bounded by the streaming sink).
pub fn create_router<S, H>(service: Arc<S>, store: Arc<H>) -> Router
where
    S: IngestApi + 'static,
    H: StoreHealth + 'static,
{
    Router::new()
        .route("/upload", post(upload_document::<S, H>))
        .route("/health", get(get_health::<S, H>))
        .route("/metrics", get(get_metrics::<S, H>))
        .route("/commands", get(get_commands))
        .layer(DefaultBodyLimit::disable())
        .with_state((service, store))
}

/// Success response for the `POST /upload` endpoint.
#[derive(Serialize)]
struct UploadResponse {
    /// Sanitized filename the upload was staged under.
    filename: String,
    /// Content type as declared by the client.
    content_type: String,
    /// Exact byte length of the uploaded stream.
    size_bytes: u64,
    /// Embedding vector computed from the extracted text.
    embeddings: Vec<f32>,
}

impl From<IngestOutcome> for UploadResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            filename: outcome.filename,
            content_type: outcome.content_type,
            size_bytes: outcome.size_bytes,
            embeddings: outcome.embedding,
        }
    }
}

/// Ingest an uploaded document and return its embedding.
///
/// Reads the first multipart part named `file` and hands its byte stream to
/// the pipeline without buffering it. Parts with other names are skipped; a
/// body with no `file` part is a client error.
async fn upload_document<S, H>(
    State((service, _store)): State<(Arc<S>, Arc<H>)>,
    mut multipart: Multipart,
) -> Result<Response, AppError>
where
    S: IngestApi,
    H: StoreHealth,
{
    let request_id = uuid::Uuid::new_v4();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::invalid_request(format!("malformed multipart body: {err}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field
            .content_type()
            .map(str::to_string)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let stream = futures_util::stream::unfold(field, |mut field| async move {
            match field.chunk().await {
                Ok(Some(bytes)) => Some((Ok(bytes), field)),
                Ok(None) => None,
                Err(err) => Some((Err(io::Error::other(err)), field)),
            }
        });

        let outcome = service
            .ingest(UploadRequest {
                filename,
                content_type,
                stream: Box::pin(stream),
            })
            .await?;

        tracing::info!(
            %request_id,
            filename = %outcome.filename,
            size_bytes = outcome.size_bytes,
            dimension = outcome.embedding.len(),
            "Upload request completed"
        );

        return Ok((StatusCode::CREATED, Json(UploadResponse::from(outcome))).into_response());
    }

    Err(AppError::invalid_request(
        "multipart body must include a 'file' part",
    ))
}

/// Response body for `GET /health`.
#[derive(Serialize)]
struct HealthResponse {
    /// `"ok"` when the backing store responds, `"degraded"` otherwise.
    status: String,
    /// Whether the connection pool could round-trip a probe query.
    store_reachable: bool,
    /// The crate version from `Cargo.toml`.
    version: String,
}

/// Health check: the server is up; the store probe reports reachability
/// without failing the endpoint.
async fn get_health<S, H>(State((_service, store)): State<(Arc<S>, Arc<H>)>) -> Json<HealthResponse>
where
    S: IngestApi,
    H: StoreHealth,
{
    let store_reachable = match store.ping().await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(error = %error, "Store health probe failed");
            false
        }
    };

    Json(HealthResponse {
        status: if store_reachable { "ok" } else { "degraded" }.to_string(),
        store_reachable,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Return a concise metrics snapshot with pipeline stage counters.
async fn get_metrics<S, H>(
    State((service, _store)): State<(Arc<S>, Arc<H>)>,
) -> Json<MetricsSnapshot>
where
    S: IngestApi,
    H: StoreHealth,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: String,
}

/// Response body for `GET /commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery/UX in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "upload",
                method: "POST",
                path: "/upload",
                description: format!(
                    "Upload one document as a multipart 'file' part; returns {{ filename, \
                     content_type, size_bytes, embeddings }}. Supported extensions: {}.",
                    crate::formats::supported_extensions().join(", ")
                ),
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Liveness check including backing-store reachability.".to_string(),
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/metrics",
                description: "Ingestion counters useful for observability dashboards.".to_string(),
            },
        ],
    })
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "invalid_request",
            message: message.into(),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        let (status, code) = match &err {
            IngestError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            IngestError::UnsupportedFormat { .. } => (StatusCode::BAD_REQUEST, "unsupported_format"),
            IngestError::IoWrite(_) => (StatusCode::INTERNAL_SERVER_ERROR, "io_write"),
            IngestError::Extraction(_) => (StatusCode::INTERNAL_SERVER_ERROR, "extraction"),
            IngestError::Embedding(_) => (StatusCode::BAD_GATEWAY, "embedding"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code,
                "message": self.message,
            }
        });
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingError;
    use crate::extract::ExtractError;
    use crate::metrics::MetricsSnapshot;
    use crate::pool::PoolError;
    use crate::storage::SinkError;
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode},
    };
    use futures_util::TryStreamExt;
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docvec-test-boundary";

    fn multipart_request(filename: Option<&str>, part_name: &str, body: &[u8]) -> Request<Body> {
        let disposition = match filename {
            Some(name) => format!("form-data; name=\"{part_name}\"; filename=\"{name}\""),
            None => format!("form-data; name=\"{part_name}\""),
        };
        let mut payload = Vec::new();
        payload.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        payload.extend_from_slice(
            format!("Content-Disposition: {disposition}\r\nContent-Type: text/markdown\r\n\r\n")
                .as_bytes(),
        );
        payload.extend_from_slice(body);
        payload.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method(Method::POST)
            .uri("/upload")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(payload))
            .expect("request")
    }

    #[derive(Clone, Debug)]
    struct IngestCall {
        filename: Option<String>,
        content_type: String,
        body: Vec<u8>,
    }

    enum StubResponse {
        Success(IngestOutcome),
        InvalidRequest,
        UnsupportedFormat,
        IoWrite,
        Extraction,
        Embedding,
    }

    struct StubIngestService {
        calls: Arc<Mutex<Vec<IngestCall>>>,
        response: StubResponse,
    }

    impl StubIngestService {
        fn new(response: StubResponse) -> Self {
            Self {
                calls: Arc::new(Mutex::new(Vec::new())),
                response,
            }
        }

        async fn recorded_calls(&self) -> Vec<IngestCall> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl IngestApi for StubIngestService {
        async fn ingest(
            &self,
            request: UploadRequest<'_>,
        ) -> Result<IngestOutcome, IngestError> {
            let body: Vec<u8> = request
                .stream
                .try_fold(Vec::new(), |mut acc, chunk| async move {
                    acc.extend_from_slice(&chunk);
                    Ok(acc)
                })
                .await
                .expect("stream collects");
            self.calls.lock().await.push(IngestCall {
                filename: request.filename.clone(),
                content_type: request.content_type.clone(),
                body,
            });

            match &self.response {
                StubResponse::Success(outcome) => Ok(outcome.clone()),
                StubResponse::InvalidRequest => Err(IngestError::InvalidRequest(
                    "uploaded file must include a filename".to_string(),
                )),
                StubResponse::UnsupportedFormat => Err(IngestError::UnsupportedFormat {
                    extension: "exe".to_string(),
                }),
                StubResponse::IoWrite => Err(IngestError::IoWrite(SinkError::Stream(
                    io::Error::other("disk full"),
                ))),
                StubResponse::Extraction => Err(IngestError::Extraction(ExtractError::Ooxml(
                    "not a valid OOXML container".to_string(),
                ))),
                StubResponse::Embedding => Err(IngestError::Embedding(EmbeddingError::Backend(
                    "connection refused".to_string(),
                ))),
            }
        }

        fn metrics_snapshot(&self) -> MetricsSnapshot {
            MetricsSnapshot {
                files_stored: 3,
                extractions_attempted: 2,
                embeddings_attempted: 2,
                uploads_completed: 2,
                uploads_failed: 1,
            }
        }
    }

    struct HealthyStore;

    #[async_trait]
    impl StoreHealth for HealthyStore {
        async fn ping(&self) -> Result<(), PoolError> {
            Ok(())
        }
    }

    struct DownStore;

    #[async_trait]
    impl StoreHealth for DownStore {
        async fn ping(&self) -> Result<(), PoolError> {
            Err(PoolError::Closed)
        }
    }

    fn success_outcome() -> IngestOutcome {
        IngestOutcome {
            filename: "notes.md".to_string(),
            content_type: "text/markdown".to_string(),
            size_bytes: 11,
            embedding: vec![0.5, 0.25, 0.125],
        }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body bytes");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn upload_returns_201_with_embeddings() {
        let service = Arc::new(StubIngestService::new(StubResponse::Success(
            success_outcome(),
        )));
        let app = create_router(service.clone(), Arc::new(HealthyStore));

        let response = app
            .oneshot(multipart_request(Some("notes.md"), "file", b"hello world"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body_json(response).await;
        assert_eq!(json["filename"], "notes.md");
        assert_eq!(json["content_type"], "text/markdown");
        assert_eq!(json["size_bytes"], 11);
        assert_eq!(json["embeddings"].as_array().map(Vec::len), Some(3));

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].filename.as_deref(), Some("notes.md"));
        assert_eq!(calls[0].content_type, "text/markdown");
        assert_eq!(calls[0].body, b"hello world");
    }

    #[tokio::test]
    async fn part_without_filename_reaches_the_pipeline_as_none() {
        let service = Arc::new(StubIngestService::new(StubResponse::InvalidRequest));
        let app = create_router(service.clone(), Arc::new(HealthyStore));

        let response = app
            .oneshot(multipart_request(None, "file", b"anonymous"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid_request");

        let calls = service.recorded_calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].filename, None);
    }

    #[tokio::test]
    async fn missing_file_part_is_rejected_without_calling_the_pipeline() {
        let service = Arc::new(StubIngestService::new(StubResponse::Success(
            success_outcome(),
        )));
        let app = create_router(service.clone(), Arc::new(HealthyStore));

        let response = app
            .oneshot(multipart_request(Some("notes.md"), "attachment", b"data"))
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid_request");
        assert!(service.recorded_calls().await.is_empty());
    }

    #[tokio::test]
    async fn pipeline_errors_map_to_distinct_statuses_and_codes() {
        let cases = [
            (
                StubResponse::UnsupportedFormat,
                StatusCode::BAD_REQUEST,
                "unsupported_format",
            ),
            (
                StubResponse::IoWrite,
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_write",
            ),
            (
                StubResponse::Extraction,
                StatusCode::INTERNAL_SERVER_ERROR,
                "extraction",
            ),
            (StubResponse::Embedding, StatusCode::BAD_GATEWAY, "embedding"),
        ];

        for (stub, expected_status, expected_code) in cases {
            let service = Arc::new(StubIngestService::new(stub));
            let app = create_router(service, Arc::new(HealthyStore));

            let response = app
                .oneshot(multipart_request(Some("doc.md"), "file", b"data"))
                .await
                .expect("router response");

            assert_eq!(response.status(), expected_status, "{expected_code}");
            let json = body_json(response).await;
            assert_eq!(json["error"]["code"], expected_code);
            assert!(json["error"]["message"].as_str().is_some());
        }
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_the_snapshot() {
        let service = Arc::new(StubIngestService::new(StubResponse::Success(
            success_outcome(),
        )));
        let app = create_router(service, Arc::new(HealthyStore));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["files_stored"], 3);
        assert_eq!(json["uploads_failed"], 1);
    }

    #[tokio::test]
    async fn health_reports_store_reachability() {
        let service = Arc::new(StubIngestService::new(StubResponse::Success(
            success_outcome(),
        )));
        let app = create_router(service.clone(), Arc::new(HealthyStore));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["store_reachable"], true);

        let app = create_router(service, Arc::new(DownStore));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router response");
        let json = body_json(response).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["store_reachable"], false);
    }

    #[tokio::test]
    async fn commands_catalog_exposes_the_upload_endpoint() {
        let response = get_commands().await;
        let commands = response.0.commands;
        let upload = commands
            .iter()
            .find(|cmd| cmd.name == "upload")
            .expect("upload command present");

        assert_eq!(upload.method, "POST");
        assert_eq!(upload.path, "/upload");
        assert!(upload.description.contains("docx"));
        assert!(commands.len() >= 3);
    }
}
