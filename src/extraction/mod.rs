//! Best-effort text extraction from uploaded documents.

pub mod docx;
mod extractor;
pub mod pdf;
pub mod types;

pub use extractor::{DocumentExtractor, DocumentKind};
pub use pdf::{ContentStreamText, LayoutText, PageText, PdfChain, PdfStrategy};
pub use types::{
    DocxError, Extraction, NO_TEXT_EXTRACTED, PDF_UNREADABLE, StrategyError, UNSUPPORTED_FORMAT,
};
