//! Conversation plumbing: prompt assembly, request spacing, and the completion client.

pub mod client;
pub mod prompt;
pub mod throttle;
pub mod types;

pub use client::{
    ChatClient, ClientSettings, CompletionClient, RetryPolicy, TIMEOUT_REPLY, UNAVAILABLE_REPLY,
};
pub use prompt::{ANALYSIS_CHAR_LIMIT, SYSTEM_PROMPT, analysis_prompt, build_messages};
pub use throttle::Throttle;
pub use types::{CompletionError, Message, Role};
