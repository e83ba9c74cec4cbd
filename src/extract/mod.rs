//! Content extraction dispatch.
//!
//! Given a staged file and its declared extension, the dispatcher selects the
//! extraction variant for the file's format family and returns the complete
//! plain text the variant could produce. Extraction either fully succeeds or
//! fails; no truncated output is ever returned as success. Parsing of binary
//! containers runs on a blocking thread so the request task stays responsive.

mod ooxml;

use crate::formats::{self, FormatFamily};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while extracting text from a staged document.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No extraction variant is registered for the extension.
    ///
    /// The orchestrator gates on the format registry before dispatching, so
    /// this is a defensive failure rather than a reachable path in normal
    /// operation.
    #[error("no extractor registered for extension '{0}'")]
    Unsupported(String),
    /// The staged file could not be read (missing, unreadable, or not valid
    /// UTF-8 for markup formats).
    #[error("failed to read staged file {path}: {source}")]
    Io {
        /// File the extractor attempted to read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },
    /// The document container or its XML payload could not be parsed.
    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// Text extracted from a staged document.
///
/// Holds the source path as a plain reference back to the staged file; the
/// extractor does not own or mutate the file.
#[derive(Debug, Clone)]
pub struct ExtractedContent {
    /// The complete textual representation of the document. May be empty.
    pub text: String,
    /// Path of the staged file the text came from.
    pub source: PathBuf,
}

/// Extract plain text from the staged file at `path`.
///
/// `extension` is the lowercased extension with no leading dot, as produced
/// by the orchestrator's format gate.
pub async fn extract(path: &Path, extension: &str) -> Result<ExtractedContent, ExtractError> {
    let family = formats::family_for(extension)
        .ok_or_else(|| ExtractError::Unsupported(extension.to_string()))?;

    let text = match family {
        FormatFamily::Markup => read_markup(path).await?,
        FormatFamily::WordDocument | FormatFamily::Presentation | FormatFamily::Spreadsheet => {
            let bytes = tokio::fs::read(path).await.map_err(|source| ExtractError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            tokio::task::spawn_blocking(move || match family {
                FormatFamily::WordDocument => ooxml::extract_docx(&bytes),
                FormatFamily::Presentation => ooxml::extract_pptx(&bytes),
                FormatFamily::Spreadsheet => ooxml::extract_xlsx(&bytes),
                FormatFamily::Markup => unreachable!("markup handled on the async path"),
            })
            .await
            .map_err(|err| ExtractError::Ooxml(format!("extraction task failed: {err}")))??
        }
    };

    tracing::debug!(
        path = %path.display(),
        extension,
        chars = text.len(),
        "Extracted document text"
    );

    Ok(ExtractedContent {
        text,
        source: path.to_path_buf(),
    })
}

/// Read a plain markup document as strict UTF-8.
///
/// Invalid encoding is an extraction failure, not a lossy conversion.
async fn read_markup(path: &Path) -> Result<String, ExtractError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn unsupported_extension_is_a_defensive_error() {
        let err = extract(Path::new("somewhere.bin"), "bin").await.unwrap_err();
        assert!(matches!(err, ExtractError::Unsupported(ext) if ext == "bin"));
    }

    #[tokio::test]
    async fn markup_reads_file_contents_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Title\n\nbody text\n").unwrap();

        let content = extract(&path, "md").await.unwrap();
        assert_eq!(content.text, "# Title\n\nbody text\n");
        assert_eq!(content.source, path);
    }

    #[tokio::test]
    async fn markup_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&[0xff, 0xfe, 0x00, 0x41]).unwrap();

        let err = extract(&path, "txt").await.unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let err = extract(Path::new("/nonexistent/file.md"), "md")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Io { .. }));
    }

    #[tokio::test]
    async fn corrupt_container_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.docx");
        std::fs::write(&path, b"this is not a zip archive").unwrap();

        let err = extract(&path, "docx").await.unwrap_err();
        assert!(matches!(err, ExtractError::Ooxml(_)));
    }
}
