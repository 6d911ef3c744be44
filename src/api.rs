//! HTTP surface for SATHI.
//!
//! The router exposes two JSON endpoints:
//!
//! - `POST /chat`: Relay `{ "message", "history" }` to the assistant and return
//!   `{ "response", "history" }`, where `history` is the input history followed by the new user
//!   turn and the assistant's reply.
//! - `POST /upload`: Accept a multipart `file` (`txt`, `pdf`, `doc`, `docx`), store it
//!   temporarily, and return `{ "success": true, "analysis", "filename" }`. The stored file is
//!   deleted before the response is sent, whatever the outcome.
//!
//! [`create_app`] adds the static front-end, permissive CORS, request tracing, and a panic guard
//! on top of the API routes. Every error is rendered as `{ "error": "..." }`.

use crate::assistant::AssistantApi;
use crate::chat::Message;
use crate::uploads::{ALLOWED_EXTENSIONS, TempUpload, UploadSettings, is_allowed, sanitize_filename};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer};

/// Allowance for multipart framing on top of the upload size cap.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Shared handler state.
struct ApiState<S> {
    service: Arc<S>,
    uploads: Arc<UploadSettings>,
}

impl<S> Clone for ApiState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            uploads: Arc::clone(&self.uploads),
        }
    }
}

/// Build the JSON API router.
pub fn create_router<S>(service: Arc<S>, uploads: UploadSettings) -> Router
where
    S: AssistantApi + 'static,
{
    let body_limit = uploads.max_bytes.saturating_add(MULTIPART_OVERHEAD);
    let state = ApiState {
        service,
        uploads: Arc::new(uploads),
    };
    Router::new()
        .route("/chat", post(chat::<S>))
        .route(
            "/upload",
            post(upload::<S>).layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}

/// Build the full application: API routes, static front-end fallback, and middleware.
pub fn create_app<S>(service: Arc<S>, uploads: UploadSettings, frontend_dir: &Path) -> Router
where
    S: AssistantApi + 'static,
{
    create_router(service, uploads)
        .fallback_service(ServeDir::new(frontend_dir))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Request body for `POST /chat`.
#[derive(Deserialize)]
struct ChatRequest {
    /// New user message.
    #[serde(default)]
    message: Option<String>,
    /// Prior turns, oldest first.
    #[serde(default)]
    history: Vec<Message>,
}

/// Success response for `POST /chat`.
#[derive(Serialize)]
struct ChatResponse {
    response: String,
    history: Vec<Message>,
}

/// Answer a chat message and echo the extended history back.
async fn chat<S>(
    State(state): State<ApiState<S>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError>
where
    S: AssistantApi,
{
    let Json(request) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let message = request
        .message
        .filter(|message| !message.is_empty())
        .ok_or_else(|| ApiError::BadRequest("No message provided".into()))?;

    let response = state.service.reply(&message, &request.history).await;
    tracing::info!(
        history_len = request.history.len(),
        reply_chars = response.len(),
        "Chat request completed"
    );

    let mut history = request.history;
    history.push(Message::user(message));
    history.push(Message::assistant(response.clone()));
    Ok(Json(ChatResponse { response, history }))
}

/// Success response for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    success: bool,
    analysis: String,
    filename: String,
}

/// Store an uploaded document, analyze it, and delete it again.
async fn upload<S>(
    State(state): State<ApiState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, ApiError>
where
    S: AssistantApi,
{
    let mut multipart =
        multipart.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let settings = &state.uploads;

    let mut received = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| multipart_error(error, settings))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let raw_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|error| multipart_error(error, settings))?;
        received = Some((raw_name, bytes));
        break;
    }

    let Some((raw_name, bytes)) = received else {
        return Err(ApiError::BadRequest("No file part".into()));
    };
    if raw_name.is_empty() {
        return Err(ApiError::BadRequest("No selected file".into()));
    }
    if !is_allowed(&raw_name) {
        return Err(ApiError::BadRequest(format!(
            "File type not allowed. Please upload {} files.",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    let filename = sanitize_filename(&raw_name);

    let stored = TempUpload::persist(&settings.dir, &filename, &bytes)
        .await
        .map_err(ApiError::internal)?;
    let size = stored.size_on_disk().await.map_err(ApiError::internal)?;
    if size > settings.max_bytes as u64 {
        tracing::info!(filename = %filename, size, max = settings.max_bytes, "Rejected oversized upload");
        return Err(ApiError::TooLarge(too_large_message(settings)));
    }

    let analysis = state.service.analyze_document(stored.path()).await;
    drop(stored);
    tracing::info!(filename = %filename, size, "Upload analyzed");

    Ok(Json(UploadResponse {
        success: true,
        analysis,
        filename,
    }))
}

fn too_large_message(settings: &UploadSettings) -> String {
    format!(
        "File too large. Maximum size is {}.",
        settings.max_size_label()
    )
}

fn multipart_error(error: MultipartError, settings: &UploadSettings) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::BodyLimit(too_large_message(settings))
    } else {
        ApiError::BadRequest(error.body_text())
    }
}

fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("Request handler panicked");
    ApiError::Internal("request handler panicked".into()).into_response()
}

/// Errors rendered by the HTTP layer as `{ "error": "..." }`.
#[derive(Debug, Error)]
enum ApiError {
    /// Client sent an unusable request.
    #[error("{0}")]
    BadRequest(String),
    /// Stored upload turned out larger than the cap.
    #[error("{0}")]
    TooLarge(String),
    /// Request body exceeded the limit while it was being read.
    #[error("{0}")]
    BodyLimit(String),
    /// Unexpected server-side failure.
    #[error("Server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn internal(error: impl std::fmt::Display) -> Self {
        Self::Internal(error.to_string())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::TooLarge(_) => StatusCode::BAD_REQUEST,
            Self::BodyLimit(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, %status, "Request rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
