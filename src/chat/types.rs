//! Conversation data types and errors for the chat-completion client.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker attached to a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructional text that frames the whole conversation.
    System,
    /// Turn written by the end user.
    User,
    /// Turn produced by the model.
    Assistant,
}

/// Single conversation turn as exchanged with both the browser and the completion API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Author of the turn.
    pub role: Role,
    /// Plain-text body of the turn.
    pub content: String,
}

impl Message {
    /// Build a system-role message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant-role message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Failures raised by a single completion attempt.
///
/// These never reach HTTP callers directly; the client folds them into user-facing text.
#[derive(Debug, Error)]
pub enum CompletionError {
    /// Remote endpoint asked us to slow down.
    #[error("rate limited by completion endpoint")]
    RateLimited,
    /// Request did not complete within the configured timeout.
    #[error("completion request timed out")]
    Timeout,
    /// Remote endpoint answered with a non-success status other than 429.
    #[error("{status}")]
    Status {
        /// Status returned by the endpoint.
        status: StatusCode,
        /// Body returned alongside the status, kept for logging.
        body: String,
    },
    /// Transport failed before a response was received.
    #[error("request failed: {0}")]
    Transport(#[source] reqwest::Error),
    /// Response body did not carry an assistant message.
    #[error("malformed completion response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Transport(error)
        }
    }
}

/// Request body sent to the chat-completion endpoint.
#[derive(Debug, Serialize)]
pub(crate) struct CompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Subset of the chat-completion response we consume.
#[derive(Debug, Deserialize)]
pub(crate) struct CompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl CompletionResponse {
    /// Return the first choice's message content.
    pub(crate) fn into_content(self) -> Result<String, CompletionError> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CompletionError::InvalidResponse("missing choices[0].message.content".into())
            })
    }
}
