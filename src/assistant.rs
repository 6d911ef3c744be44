//! Assistant service tying the completion client to document extraction.

use crate::chat::{ChatClient, CompletionClient, CompletionError, Message, analysis_prompt};
use crate::config::Config;
use crate::extraction::{DocumentExtractor, Extraction};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Operations the HTTP surface needs from the assistant.
#[async_trait]
pub trait AssistantApi: Send + Sync {
    /// Reply to `message` in the context of `history`.
    async fn reply(&self, message: &str, history: &[Message]) -> String;

    /// Extract the document at `path` and return the model's analysis, or a diagnostic.
    async fn analyze_document(&self, path: &Path) -> String;
}

/// Owns the long-lived completion client and document extractor.
///
/// Construct once at startup and share through an `Arc`; every request reuses the same client
/// and therefore the same request throttle.
pub struct Assistant {
    chat: Box<dyn ChatClient>,
    extractor: Arc<DocumentExtractor>,
}

impl Assistant {
    /// Assemble an assistant from its parts.
    pub fn new(chat: Box<dyn ChatClient>, extractor: DocumentExtractor) -> Self {
        Self {
            chat,
            extractor: Arc::new(extractor),
        }
    }

    /// Build the production assistant from configuration.
    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        tracing::info!("Initializing completion client");
        let client = CompletionClient::from_config(config)?;
        Ok(Self::new(Box::new(client), DocumentExtractor::default()))
    }

    async fn extract(&self, path: &Path) -> Extraction {
        let extractor = Arc::clone(&self.extractor);
        let owned: PathBuf = path.to_path_buf();
        match tokio::task::spawn_blocking(move || extractor.extract(&owned)).await {
            Ok(extraction) => extraction,
            Err(error) => {
                tracing::error!(%error, "Extraction worker failed");
                Extraction::processing_error(error)
            }
        }
    }
}

#[async_trait]
impl AssistantApi for Assistant {
    async fn reply(&self, message: &str, history: &[Message]) -> String {
        self.chat.reply(message, history).await
    }

    async fn analyze_document(&self, path: &Path) -> String {
        match self.extract(path).await {
            Extraction::Text(text) => {
                tracing::info!(path = %path.display(), chars = text.chars().count(), "Analyzing document");
                self.chat.reply(&analysis_prompt(&text), &[]).await
            }
            Extraction::Diagnostic(message) => {
                tracing::info!(path = %path.display(), diagnostic = %message, "Document not analyzed");
                message
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::UNSUPPORTED_FORMAT;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingChat {
        calls: Arc<Mutex<Vec<(String, Vec<Message>)>>>,
    }

    #[async_trait]
    impl ChatClient for RecordingChat {
        async fn reply(&self, user_input: &str, history: &[Message]) -> String {
            self.calls
                .lock()
                .await
                .push((user_input.to_string(), history.to_vec()));
            "analysis".into()
        }
    }

    fn assistant() -> (Assistant, Arc<Mutex<Vec<(String, Vec<Message>)>>>) {
        let chat = RecordingChat::default();
        let calls = Arc::clone(&chat.calls);
        (
            Assistant::new(Box::new(chat), DocumentExtractor::default()),
            calls,
        )
    }

    #[tokio::test]
    async fn extracted_text_is_wrapped_and_sent_without_history() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("feedback.txt");
        std::fs::write(&path, "Guests loved the rooftop breakfast.").expect("write");
        let (assistant, calls) = assistant();

        let analysis = assistant.analyze_document(&path).await;

        assert_eq!(analysis, "analysis");
        let calls = calls.lock().await;
        assert_eq!(calls.len(), 1);
        let (prompt, history) = &calls[0];
        assert!(prompt.contains("DOCUMENT CONTENT:"));
        assert!(prompt.contains("Guests loved the rooftop breakfast."));
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn long_documents_are_truncated_before_analysis() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("manual.txt");
        std::fs::write(&path, "x".repeat(10_000)).expect("write");
        let (assistant, calls) = assistant();

        assistant.analyze_document(&path).await;

        let calls = calls.lock().await;
        assert_eq!(calls[0].0.matches('x').count(), crate::chat::ANALYSIS_CHAR_LIMIT);
    }

    #[tokio::test]
    async fn diagnostics_skip_the_model() {
        let (assistant, calls) = assistant();

        let analysis = assistant.analyze_document(Path::new("rates.csv")).await;

        assert_eq!(analysis, UNSUPPORTED_FORMAT);
        assert!(calls.lock().await.is_empty());
    }
}
