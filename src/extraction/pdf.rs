//! PDF text extraction as an ordered chain of independent strategies.
//!
//! Strategies run in priority order and the first non-blank result wins. A strategy that is
//! compiled out, returns an error, panics inside its parser, or finds only whitespace simply
//! hands over to the next one.

use super::types::StrategyError;
use lopdf::content::Content;
use lopdf::{Document, Object};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

/// One way of pulling text out of a PDF file.
pub trait PdfStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Extract the document's text.
    fn extract(&self, path: &Path) -> Result<String, StrategyError>;
}

/// Layout-aware text extraction backed by `pdf-extract`.
pub struct LayoutText;

impl PdfStrategy for LayoutText {
    fn name(&self) -> &'static str {
        "layout"
    }

    #[cfg(feature = "layout-pdf")]
    fn extract(&self, path: &Path) -> Result<String, StrategyError> {
        guarded(|| {
            pdf_extract::extract_text(path).map_err(|error| StrategyError::Failed(error.to_string()))
        })
    }

    #[cfg(not(feature = "layout-pdf"))]
    fn extract(&self, _path: &Path) -> Result<String, StrategyError> {
        Err(StrategyError::Unavailable("layout-aware PDF"))
    }
}

/// Page-by-page text reader using `lopdf`'s built-in extraction.
pub struct PageText;

impl PdfStrategy for PageText {
    fn name(&self) -> &'static str {
        "page-text"
    }

    fn extract(&self, path: &Path) -> Result<String, StrategyError> {
        guarded(|| {
            let document = load(path)?;
            let mut text = String::new();
            for page_number in document.get_pages().into_keys() {
                match document.extract_text(&[page_number]) {
                    Ok(page_text) if !page_text.trim().is_empty() => {
                        text.push_str(&page_text);
                        text.push('\n');
                    }
                    Ok(_) => {}
                    Err(error) => {
                        tracing::debug!(page = page_number, %error, "Page text unavailable");
                    }
                }
            }
            Ok(text)
        })
    }
}

/// Low-level miner that reads string operands straight out of each page's content stream.
pub struct ContentStreamText;

impl PdfStrategy for ContentStreamText {
    fn name(&self) -> &'static str {
        "content-stream"
    }

    fn extract(&self, path: &Path) -> Result<String, StrategyError> {
        guarded(|| {
            let document = load(path)?;
            let mut text = String::new();
            for (page_number, page_id) in document.get_pages() {
                let content = document
                    .get_page_content(page_id)
                    .and_then(|bytes| Content::decode(&bytes));
                match content {
                    Ok(content) => {
                        mine_operations(&content, &mut text);
                        text.push('\n');
                    }
                    Err(error) => {
                        tracing::debug!(page = page_number, %error, "Content stream unreadable");
                    }
                }
            }
            Ok(text)
        })
    }
}

/// Append the text-showing operands of `content`, breaking lines on text positioning.
fn mine_operations(content: &Content, text: &mut String) {
    for operation in &content.operations {
        match operation.operator.as_str() {
            "Tj" => push_operand_strings(&operation.operands, text),
            "TJ" => {
                for operand in &operation.operands {
                    if let Object::Array(items) = operand {
                        push_operand_strings(items, text);
                    }
                }
            }
            "'" | "\"" => {
                text.push('\n');
                push_operand_strings(&operation.operands, text);
            }
            "Td" | "TD" | "T*" | "ET" => {
                if !text.is_empty() && !text.ends_with('\n') {
                    text.push('\n');
                }
            }
            _ => {}
        }
    }
}

fn push_operand_strings(operands: &[Object], text: &mut String) {
    for operand in operands {
        if let Object::String(bytes, _) = operand {
            text.extend(bytes.iter().map(|&byte| char::from(byte)).filter(|ch| {
                !ch.is_control() || ch.is_whitespace()
            }));
        }
    }
}

fn load(path: &Path) -> Result<Document, StrategyError> {
    Document::load(path).map_err(|error| StrategyError::Failed(error.to_string()))
}

/// Run a parser, turning a panic inside it into a strategy failure.
fn guarded<F>(run: F) -> Result<String, StrategyError>
where
    F: FnOnce() -> Result<String, StrategyError>,
{
    catch_unwind(AssertUnwindSafe(run)).unwrap_or_else(|panic| {
        let reason = panic
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "parser panicked".to_string());
        Err(StrategyError::Failed(reason))
    })
}

/// Ordered list of strategies tried until one yields text.
pub struct PdfChain {
    strategies: Vec<Box<dyn PdfStrategy>>,
}

impl PdfChain {
    /// Build a chain from strategies in priority order.
    pub fn new(strategies: Vec<Box<dyn PdfStrategy>>) -> Self {
        Self { strategies }
    }

    /// Return the first non-blank text, or `None` when every strategy came up empty.
    pub fn extract(&self, path: &Path) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            match strategy.extract(path) {
                Ok(text) if !text.trim().is_empty() => {
                    tracing::debug!(strategy = strategy.name(), chars = text.len(), "PDF text extracted");
                    Some(text)
                }
                Ok(_) => {
                    tracing::debug!(strategy = strategy.name(), "PDF strategy found no text");
                    None
                }
                Err(error @ StrategyError::Unavailable(_)) => {
                    tracing::debug!(strategy = strategy.name(), %error, "PDF strategy skipped");
                    None
                }
                Err(error) => {
                    tracing::warn!(strategy = strategy.name(), %error, "PDF strategy failed");
                    None
                }
            }
        })
    }
}

impl Default for PdfChain {
    fn default() -> Self {
        Self::new(vec![
            Box::new(LayoutText),
            Box::new(PageText),
            Box::new(ContentStreamText),
        ])
    }
}
