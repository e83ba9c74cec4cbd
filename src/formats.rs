//! Registry of file formats the extraction pipeline understands.
//!
//! The registry is a pure lookup from a lowercased file extension (no leading
//! dot) to the extraction family responsible for it. The orchestrator consults
//! [`is_supported`] before dispatching any extraction work, so unsupported
//! uploads fail fast with a client error instead of an extraction error.

/// Families of documents the dispatcher can extract text from.
///
/// Each family maps to exactly one extraction strategy; there is no fallback
/// chaining between families.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatFamily {
    /// Word-processor documents (OOXML `.docx`).
    WordDocument,
    /// Presentation documents (OOXML `.pptx`).
    Presentation,
    /// Spreadsheet documents (OOXML `.xlsx`).
    Spreadsheet,
    /// Plain markup and text formats read verbatim.
    Markup,
}

/// Extensions handled by the plain-markup extractor.
const MARKUP_EXTENSIONS: &[&str] = &["md", "markdown", "txt", "rst", "org", "html", "htm", "tex"];

/// Resolve the extraction family for a lowercased extension, if any.
pub fn family_for(extension: &str) -> Option<FormatFamily> {
    match extension {
        "docx" => Some(FormatFamily::WordDocument),
        "pptx" => Some(FormatFamily::Presentation),
        "xlsx" => Some(FormatFamily::Spreadsheet),
        ext if MARKUP_EXTENSIONS.contains(&ext) => Some(FormatFamily::Markup),
        _ => None,
    }
}

/// Whether text extraction is supported for the given lowercased extension.
pub fn is_supported(extension: &str) -> bool {
    family_for(extension).is_some()
}

/// All supported extensions, useful for diagnostics and the command catalog.
pub fn supported_extensions() -> Vec<&'static str> {
    let mut extensions = vec!["docx", "pptx", "xlsx"];
    extensions.extend_from_slice(MARKUP_EXTENSIONS);
    extensions
}
