use super::docx::read_paragraphs;
use super::pdf::PdfChain;
use super::types::{Extraction, PDF_UNREADABLE, UNSUPPORTED_FORMAT};
use std::path::Path;

/// Document kinds recognized by their file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Plain UTF-8 text (`.txt`).
    PlainText,
    /// Word document (`.doc`, `.docx`).
    Word,
    /// Portable Document Format (`.pdf`).
    Pdf,
}

impl DocumentKind {
    /// Classify `path` by its extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "txt" => Some(Self::PlainText),
            "doc" | "docx" => Some(Self::Word),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

/// Turns uploaded files into text, always answering with an [`Extraction`].
pub struct DocumentExtractor {
    pdf: PdfChain,
}

impl DocumentExtractor {
    /// Build an extractor using the given PDF strategy chain.
    pub fn new(pdf: PdfChain) -> Self {
        Self { pdf }
    }

    /// Extract text from the file at `path`, dispatching on its extension.
    ///
    /// This performs blocking file I/O and parsing; async callers should run it on a blocking
    /// worker.
    pub fn extract(&self, path: &Path) -> Extraction {
        let Some(kind) = DocumentKind::from_path(path) else {
            tracing::info!(path = %path.display(), "Unsupported document type");
            return Extraction::Diagnostic(UNSUPPORTED_FORMAT.to_string());
        };
        tracing::debug!(path = %path.display(), ?kind, "Extracting document text");

        match kind {
            DocumentKind::PlainText => match std::fs::read(path) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => Extraction::from_text(text),
                    Err(error) => Extraction::processing_error(error),
                },
                Err(error) => Extraction::processing_error(error),
            },
            DocumentKind::Word => match read_paragraphs(path) {
                Ok(text) => Extraction::from_text(text),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "Word extraction failed");
                    Extraction::processing_error(error)
                }
            },
            DocumentKind::Pdf => match self.pdf.extract(path) {
                Some(text) => Extraction::Text(text),
                None => Extraction::Diagnostic(PDF_UNREADABLE.to_string()),
            },
        }
    }
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new(PdfChain::default())
    }
}
