use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_CHAT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";
const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-chat";
const DEFAULT_REFERER: &str = "http://localhost:5000";
const DEFAULT_APP_TITLE: &str = "SATHI Hospitality AI";
const DEFAULT_UPLOAD_MAX_BYTES: usize = 16 * 1024 * 1024;
const DEFAULT_LOG_FILE: &str = "logs/sathi.log";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the SATHI server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bearer token for the chat-completion endpoint.
    pub chat_api_key: String,
    /// Full URL of the chat-completion endpoint.
    pub chat_api_url: String,
    /// Model identifier sent with every completion request.
    pub chat_model: String,
    /// Sampling temperature.
    pub chat_temperature: f32,
    /// Completion token cap.
    pub chat_max_tokens: u32,
    /// Per-attempt request timeout in seconds.
    pub chat_timeout_secs: u64,
    /// Minimum spacing between outbound requests in milliseconds.
    pub chat_min_interval_ms: u64,
    /// Attempts per reply, including the first.
    pub chat_max_attempts: u32,
    /// `HTTP-Referer` header identifying the deployment.
    pub chat_referer: String,
    /// `X-Title` header identifying the application.
    pub chat_app_title: String,
    /// Directory for temporary upload files.
    pub upload_dir: PathBuf,
    /// Largest accepted upload in bytes.
    pub upload_max_bytes: usize,
    /// Directory holding the static front-end.
    pub frontend_dir: PathBuf,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// File that receives a copy of every log line.
    pub log_file: PathBuf,
    /// Default tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            chat_api_key: load_env("CHAT_API_KEY")?,
            chat_api_url: load_env_or("CHAT_API_URL", DEFAULT_CHAT_API_URL),
            chat_model: load_env_or("CHAT_MODEL", DEFAULT_CHAT_MODEL),
            chat_temperature: parse_env_or("CHAT_TEMPERATURE", 0.7)?,
            chat_max_tokens: parse_env_or("CHAT_MAX_TOKENS", 2000)?,
            chat_timeout_secs: parse_env_or("CHAT_TIMEOUT_SECS", 30)?,
            chat_min_interval_ms: parse_env_or("CHAT_MIN_INTERVAL_MS", 1500)?,
            chat_max_attempts: parse_env_or("CHAT_MAX_ATTEMPTS", 3)?,
            chat_referer: load_env_or("CHAT_REFERER", DEFAULT_REFERER),
            chat_app_title: load_env_or("CHAT_APP_TITLE", DEFAULT_APP_TITLE),
            upload_dir: load_env_or("UPLOAD_DIR", "uploads").into(),
            upload_max_bytes: parse_env_or("UPLOAD_MAX_BYTES", DEFAULT_UPLOAD_MAX_BYTES)?,
            frontend_dir: load_env_or("FRONTEND_DIR", "frontend").into(),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
            log_file: load_env_or("SATHI_LOG_FILE", DEFAULT_LOG_FILE).into(),
            log_level: load_env_or("SATHI_LOG_LEVEL", "info"),
        };

        if config.chat_max_attempts == 0 {
            return Err(ConfigError::InvalidValue("CHAT_MAX_ATTEMPTS".into()));
        }
        if config.upload_max_bytes == 0 {
            return Err(ConfigError::InvalidValue("UPLOAD_MAX_BYTES".into()));
        }
        Ok(config)
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_env_or(key: &str, default: &str) -> String {
    load_env_optional(key).unwrap_or_else(|| default.to_string())
}

fn parse_env_or<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

/// Load `.env` (when present) and then the configuration from the environment.
pub fn load_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    Config::from_env()
}
