//! Outcome and error types for document text extraction.

use thiserror::Error;

/// Diagnostic returned for file types the extractor does not handle.
pub const UNSUPPORTED_FORMAT: &str =
    "Unsupported file format. Please upload PDF, Word, or text documents.";
/// Diagnostic returned when a document yields only whitespace.
pub const NO_TEXT_EXTRACTED: &str =
    "No text could be extracted from the document. The file might be scanned or contain only images.";
/// Diagnostic returned when every PDF strategy came up empty.
pub const PDF_UNREADABLE: &str =
    "Could not extract text from PDF. The file might be scanned or image-based.";

/// Result of extracting text from an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Non-blank text recovered from the document.
    Text(String),
    /// User-facing explanation of why no text is available.
    Diagnostic(String),
}

impl Extraction {
    /// Wrap `text`, turning blank output into the "no text" diagnostic.
    pub fn from_text(text: String) -> Self {
        if text.trim().is_empty() {
            Self::Diagnostic(NO_TEXT_EXTRACTED.to_string())
        } else {
            Self::Text(text)
        }
    }

    /// Diagnostic for a failure outside the PDF fallback chain.
    pub fn processing_error(error: impl std::fmt::Display) -> Self {
        Self::Diagnostic(format!("Error processing document: {error}"))
    }

    /// Extracted text, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Diagnostic(_) => None,
        }
    }
}

/// Reasons a single PDF strategy produced nothing.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// Strategy was compiled out of this build.
    #[error("{0} support is not compiled in")]
    Unavailable(&'static str),
    /// Strategy ran and failed on this document.
    #[error("{0}")]
    Failed(String),
}

/// Errors raised while reading an Office Open XML word-processing package.
#[derive(Debug, Error)]
pub enum DocxError {
    /// File could not be opened.
    #[error("failed to open document: {0}")]
    Io(#[from] std::io::Error),
    /// File is not a readable zip package or lacks the main document part.
    #[error("not a valid Word document: {0}")]
    Package(#[from] zip::result::ZipError),
    /// Main document part is not well-formed XML.
    #[error("malformed document XML: {0}")]
    Xml(String),
}
