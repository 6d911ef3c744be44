//! Throttled chat-completion client with bounded retries.
//!
//! Every failure path resolves to text because the caller relays the reply straight to a chat
//! window. Individual attempts still report typed [`CompletionError`]s, which the retry loop
//! folds into the fixed replies below.

use crate::chat::{
    prompt::{SYSTEM_PROMPT, build_messages},
    throttle::Throttle,
    types::{CompletionError, CompletionRequest, CompletionResponse, Message},
};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Reply used when the endpoint does not answer within the request timeout.
pub const TIMEOUT_REPLY: &str = "Sorry, SATHI is taking too long to respond. Please try again.";
/// Reply used when every attempt was rate limited.
pub const UNAVAILABLE_REPLY: &str =
    "SATHI is currently unavailable due to high demand. Please try again later.";

/// Interface implemented by conversation backends.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Produce the assistant's reply to `user_input` given the prior turns.
    async fn reply(&self, user_input: &str, history: &[Message]) -> String;
}

/// Attempt budget and pauses applied between attempts.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff after the first 429; doubled for each later attempt.
    pub backoff_base: Duration,
    /// Pause before retrying after a transport or decoding failure.
    pub error_pause: Duration,
}

impl RetryPolicy {
    /// Backoff applied after a 429 on the zero-based `attempt`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(2_u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_secs(1),
            error_pause: Duration::from_secs(1),
        }
    }
}

/// Connection and request parameters for [`CompletionClient`].
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Full URL of the chat-completion endpoint.
    pub endpoint: String,
    /// Bearer token sent with every request.
    pub api_key: String,
    /// Model identifier forwarded in the request body.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token cap.
    pub max_tokens: u32,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Value of the `HTTP-Referer` attribution header.
    pub referer: String,
    /// Value of the `X-Title` attribution header.
    pub app_title: String,
    /// Retry behaviour.
    pub retry: RetryPolicy,
}

impl From<&Config> for ClientSettings {
    fn from(config: &Config) -> Self {
        Self {
            endpoint: config.chat_api_url.clone(),
            api_key: config.chat_api_key.clone(),
            model: config.chat_model.clone(),
            temperature: config.chat_temperature,
            max_tokens: config.chat_max_tokens,
            timeout: Duration::from_secs(config.chat_timeout_secs),
            referer: config.chat_referer.clone(),
            app_title: config.chat_app_title.clone(),
            retry: RetryPolicy {
                max_attempts: config.chat_max_attempts,
                ..RetryPolicy::default()
            },
        }
    }
}

/// HTTP client for an OpenAI-compatible chat-completion endpoint.
pub struct CompletionClient {
    http: Client,
    settings: ClientSettings,
    throttle: Arc<Throttle>,
}

impl CompletionClient {
    /// Build a client that spaces its requests through `throttle`.
    pub fn new(settings: ClientSettings, throttle: Arc<Throttle>) -> Result<Self, CompletionError> {
        let http = Client::builder()
            .user_agent("sathi/0.1")
            .timeout(settings.timeout)
            .build()
            .map_err(CompletionError::Transport)?;
        tracing::debug!(
            endpoint = %settings.endpoint,
            model = %settings.model,
            timeout_secs = settings.timeout.as_secs(),
            max_attempts = settings.retry.max_attempts,
            min_interval_ms = throttle.min_interval().as_millis() as u64,
            "Initialized completion client"
        );
        Ok(Self {
            http,
            settings,
            throttle,
        })
    }

    /// Build a client from the loaded configuration with its own throttle.
    pub fn from_config(config: &Config) -> Result<Self, CompletionError> {
        let throttle = Arc::new(Throttle::new(Duration::from_millis(
            config.chat_min_interval_ms,
        )));
        Self::new(ClientSettings::from(config), throttle)
    }

    /// Send `messages` upstream, retrying per the policy, and return the reply text.
    pub async fn complete(&self, messages: &[Message]) -> String {
        let policy = &self.settings.retry;
        let max_attempts = policy.max_attempts.max(1);

        for attempt in 0..max_attempts {
            let is_last = attempt + 1 == max_attempts;
            if attempt == 0 {
                self.throttle.acquire().await;
            } else {
                self.throttle.stamp().await;
            }
            match self.send_once(messages).await {
                Ok(reply) => {
                    tracing::debug!(attempt, chars = reply.len(), "Completion succeeded");
                    return reply;
                }
                Err(CompletionError::RateLimited) => {
                    if is_last {
                        tracing::warn!(attempt, max_attempts, "Rate limited on final attempt");
                        continue;
                    }
                    let wait = policy.backoff(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        wait_ms = wait.as_millis() as u64,
                        "Rate limited; backing off before retry"
                    );
                    sleep(wait).await;
                }
                Err(CompletionError::Timeout) => {
                    tracing::warn!(attempt, "Completion request timed out");
                    return TIMEOUT_REPLY.to_string();
                }
                Err(CompletionError::Status { status, body }) => {
                    tracing::error!(attempt, %status, body = %body, "Completion endpoint error");
                    return format!("HTTP Error: {status}");
                }
                Err(error) => {
                    if is_last {
                        tracing::error!(attempt, %error, "Completion failed on final attempt");
                        return format!("Sorry, SATHI encountered an error: {error}");
                    }
                    tracing::warn!(attempt, %error, "Completion attempt failed; retrying");
                    sleep(policy.error_pause).await;
                }
            }
        }

        UNAVAILABLE_REPLY.to_string()
    }

    async fn send_once(&self, messages: &[Message]) -> Result<String, CompletionError> {
        let body = CompletionRequest {
            model: &self.settings.model,
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
        };
        let response = self
            .http
            .post(&self.settings.endpoint)
            .bearer_auth(&self.settings.api_key)
            .header("HTTP-Referer", &self.settings.referer)
            .header("X-Title", &self.settings.app_title)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CompletionError::RateLimited);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status { status, body });
        }

        let payload: CompletionResponse = response.json().await?;
        payload.into_content()
    }
}

#[async_trait]
impl ChatClient for CompletionClient {
    async fn reply(&self, user_input: &str, history: &[Message]) -> String {
        let messages = build_messages(SYSTEM_PROMPT, history, user_input);
        self.complete(&messages).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, response::IntoResponse, routing::post};
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn test_settings(endpoint: String) -> ClientSettings {
        ClientSettings {
            endpoint,
            api_key: "test-key".into(),
            model: "test-model".into(),
            temperature: 0.7,
            max_tokens: 2000,
            timeout: Duration::from_secs(5),
            referer: "http://localhost:5000".into(),
            app_title: "SATHI Test".into(),
            retry: RetryPolicy {
                max_attempts: 3,
                backoff_base: Duration::from_millis(10),
                error_pause: Duration::from_millis(10),
            },
        }
    }

    fn client(settings: ClientSettings, min_interval: Duration) -> CompletionClient {
        CompletionClient::new(settings, Arc::new(Throttle::new(min_interval))).expect("client")
    }

    fn success_body(content: &str) -> serde_json::Value {
        json!({
            "choices": [
                { "message": { "role": "assistant", "content": content } }
            ]
        })
    }

    struct StubState {
        statuses: Vec<u16>,
        hits: AtomicUsize,
        arrivals: StdMutex<Vec<Instant>>,
    }

    async fn sequenced_reply(State(state): State<Arc<StubState>>) -> axum::response::Response {
        state
            .arrivals
            .lock()
            .expect("arrivals lock")
            .push(Instant::now());
        let index = state.hits.fetch_add(1, Ordering::SeqCst);
        let code = state.statuses.get(index).copied().unwrap_or(200);
        let status = axum::http::StatusCode::from_u16(code).expect("status code");
        if status.is_success() {
            (status, Json(success_body("payload"))).into_response()
        } else {
            (status, "slow down").into_response()
        }
    }

    /// Serve `statuses` in order from a local endpoint, recording when each request arrives.
    async fn spawn_sequenced_endpoint(statuses: Vec<u16>) -> (String, Arc<StubState>) {
        let state = Arc::new(StubState {
            statuses,
            hits: AtomicUsize::new(0),
            arrivals: StdMutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/v1/chat/completions", post(sequenced_reply))
            .with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind stub");
        let address = listener.local_addr().expect("stub address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });
        (format!("http://{address}/v1/chat/completions"), state)
    }

    #[tokio::test]
    async fn returns_assistant_content_and_sends_expected_request() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer test-key")
                    .header("x-title", "SATHI Test")
                    .json_body_partial(r#"{ "model": "test-model", "max_tokens": 2000 }"#)
                    .body_contains(r#""role":"system""#)
                    .body_contains(r#""content":"How do I upsell suites?""#);
                then.status(200).json_body(success_body("Offer a tailored upgrade."));
            })
            .await;

        let client = client(
            test_settings(server.url("/v1/chat/completions")),
            Duration::ZERO,
        );
        let reply = client
            .reply("How do I upsell suites?", &[Message::user("hi"), Message::assistant("hello")])
            .await;

        mock.assert_async().await;
        assert_eq!(reply, "Offer a tailored upgrade.");
    }

    #[tokio::test]
    async fn backs_off_on_rate_limit_then_succeeds() {
        let (endpoint, state) = spawn_sequenced_endpoint(vec![429, 429, 200]).await;
        let mut settings = test_settings(endpoint);
        settings.retry.backoff_base = Duration::from_secs(1);

        let reply = client(settings, Duration::ZERO).reply("hello", &[]).await;

        assert_eq!(reply, "payload");
        let arrivals = state.arrivals.lock().expect("arrivals lock").clone();
        assert_eq!(arrivals.len(), 3);
        assert!(arrivals[1] - arrivals[0] >= Duration::from_secs(1));
        assert!(arrivals[2] - arrivals[1] >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn rate_limit_backoff_is_not_stretched_by_default_spacing() {
        let (endpoint, state) = spawn_sequenced_endpoint(vec![429, 429, 200]).await;
        let mut settings = test_settings(endpoint);
        settings.retry = RetryPolicy::default();

        let reply = client(settings, Duration::from_millis(1500))
            .reply("hello", &[])
            .await;

        assert_eq!(reply, "payload");
        let arrivals = state.arrivals.lock().expect("arrivals lock").clone();
        assert_eq!(arrivals.len(), 3);
        let first_gap = arrivals[1] - arrivals[0];
        let second_gap = arrivals[2] - arrivals[1];
        assert!(first_gap >= Duration::from_secs(1), "first gap {first_gap:?}");
        assert!(first_gap < Duration::from_millis(1400), "first gap {first_gap:?}");
        assert!(second_gap >= Duration::from_secs(2), "second gap {second_gap:?}");
        assert!(second_gap < Duration::from_millis(2400), "second gap {second_gap:?}");
    }

    #[tokio::test]
    async fn timeout_returns_apology_without_retrying() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200)
                    .delay(Duration::from_secs(2))
                    .json_body(success_body("too late"));
            })
            .await;

        let mut settings = test_settings(server.url("/v1/chat/completions"));
        settings.timeout = Duration::from_millis(200);
        let reply = client(settings, Duration::ZERO).reply("hello", &[]).await;

        assert_eq!(reply, TIMEOUT_REPLY);
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn non_rate_limit_status_is_reported_immediately() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let reply = client(
            test_settings(server.url("/v1/chat/completions")),
            Duration::ZERO,
        )
        .reply("hello", &[])
        .await;

        assert!(reply.starts_with("HTTP Error: 500"), "unexpected reply: {reply}");
        mock.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn exhausted_rate_limits_report_unavailable() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(429).body("slow down");
            })
            .await;

        let reply = client(
            test_settings(server.url("/v1/chat/completions")),
            Duration::ZERO,
        )
        .reply("hello", &[])
        .await;

        assert_eq!(reply, UNAVAILABLE_REPLY);
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn malformed_payload_is_retried_then_reported() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let reply = client(
            test_settings(server.url("/v1/chat/completions")),
            Duration::ZERO,
        )
        .reply("hello", &[])
        .await;

        assert!(
            reply.starts_with("Sorry, SATHI encountered an error:"),
            "unexpected reply: {reply}"
        );
        mock.assert_hits_async(3).await;
    }

    #[tokio::test]
    async fn sequential_calls_are_spaced_by_the_throttle() {
        let (endpoint, state) = spawn_sequenced_endpoint(vec![200, 200]).await;
        let client = client(test_settings(endpoint), Duration::from_millis(1500));

        client.reply("first", &[]).await;
        client.reply("second", &[]).await;

        let arrivals = state.arrivals.lock().expect("arrivals lock").clone();
        assert_eq!(arrivals.len(), 2);
        assert!(arrivals[1] - arrivals[0] >= Duration::from_millis(1500));
    }

    #[test]
    fn backoff_doubles_per_attempt() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }
}
