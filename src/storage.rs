//! Streamed staging of uploaded files.
//!
//! Uploads arrive as a byte stream of unknown length and may be arbitrarily
//! large, so the sink never holds more than one fixed-size chunk in memory:
//! the stream is read through a 1 MiB buffer and every chunk is written to the
//! staging file as soon as it arrives. File handle and stream are owned by
//! this function and close on every exit path, including errors.

use bytes::Bytes;
use futures_util::Stream;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Fixed buffer size for the chunked read/write loop.
const WRITE_CHUNK_SIZE: usize = 1024 * 1024;

/// Longest accepted filename, matching common filesystem limits.
const MAX_FILENAME_LENGTH: usize = 255;

/// Errors raised while staging an upload.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The declared filename cannot be turned into a safe staging name.
    #[error("invalid filename: {0}")]
    InvalidFilename(String),
    /// Creating or writing the staging file failed.
    #[error("failed to write staged file {path}: {source}")]
    Write {
        /// Destination that could not be created or written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The upload stream itself failed before the file was complete.
    #[error("upload stream failed: {0}")]
    Stream(#[source] io::Error),
}

/// A fully staged upload.
#[derive(Debug, Clone)]
pub struct StoredFile {
    /// Location of the staged file inside the staging directory.
    pub path: PathBuf,
    /// Exact number of bytes written to disk.
    pub size_bytes: u64,
}

/// Reduce a client-supplied filename to a safe staging name.
///
/// Names carrying path separators or traversal sequences are rejected
/// outright — the staging path is derived from the filename alone, so a name
/// must never be able to address anything outside the staging directory.
/// Remaining characters outside `[A-Za-z0-9._-]` are replaced with `_`, and
/// names that reduce to nothing are rejected rather than silently renamed.
pub fn sanitize_filename(raw: &str) -> Result<String, SinkError> {
    if raw.contains(['/', '\\']) || raw.contains("..") {
        return Err(SinkError::InvalidFilename(
            "filename must not contain path components".to_string(),
        ));
    }

    let sanitized: String = raw
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(['_', '.']).is_empty() {
        return Err(SinkError::InvalidFilename(
            "filename reduces to an empty name".to_string(),
        ));
    }

    Ok(sanitized)
}

/// Stage an upload stream under `dir` as `filename`.
///
/// `filename` must already be sanitized; the destination path is derived from
/// it alone. The stream is consumed through a fixed-size buffer, each chunk
/// written immediately. On success the file is flushed before the handle is
/// released. A write or stream failure leaves any partial file in place.
pub async fn store<S>(dir: &Path, filename: &str, stream: S) -> Result<StoredFile, SinkError>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    let path = dir.join(filename);
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|source| SinkError::Write {
            path: path.clone(),
            source,
        })?;

    let mut reader = StreamReader::new(stream);
    let mut buf = vec![0u8; WRITE_CHUNK_SIZE];
    let mut size_bytes: u64 = 0;

    loop {
        let read = reader.read(&mut buf).await.map_err(SinkError::Stream)?;
        if read == 0 {
            break;
        }
        file.write_all(&buf[..read])
            .await
            .map_err(|source| SinkError::Write {
                path: path.clone(),
                source,
            })?;
        size_bytes += read as u64;
    }

    file.flush().await.map_err(|source| SinkError::Write {
        path: path.clone(),
        source,
    })?;

    tracing::debug!(path = %path.display(), size_bytes, "Staged upload");

    Ok(StoredFile { path, size_bytes })
}
