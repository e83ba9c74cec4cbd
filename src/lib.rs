#![deny(missing_docs)]

//! Core library for the docvec upload & embeddings server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Content extraction dispatch and format variants.
pub mod extract;
/// Registry of supported file formats.
pub mod formats;
/// Ingestion pipeline orchestration.
pub mod ingest;
/// Structured logging and tracing setup.
pub mod logging;
/// Ingestion metrics helpers.
pub mod metrics;
/// PostgreSQL connection pool lifecycle.
pub mod pool;
/// Streamed staging of uploaded files.
pub mod storage;
