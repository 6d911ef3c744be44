#![deny(missing_docs)]

//! Core library for the SATHI hospitality assistant server.

/// HTTP routing and JSON handlers.
pub mod api;
/// Assistant service shared by the HTTP handlers.
pub mod assistant;
/// Chat-completion client, prompts, and request throttling.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Document text extraction.
pub mod extraction;
/// Structured logging and tracing setup.
pub mod logging;
/// Temporary upload storage helpers.
pub mod uploads;
