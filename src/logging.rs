//! Tracing configuration and log routing.
//!
//! Logs go to stdout through a compact formatter and are mirrored to the file named by
//! [`Config::log_file`]. File output uses a non-blocking writer so request handlers never wait
//! on disk.
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Config;

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Where logs are written and which level applies when `RUST_LOG` is unset.
#[derive(Debug, Clone)]
pub struct LogSettings {
    /// File that mirrors stdout output.
    pub file: PathBuf,
    /// Fallback filter directive, such as `info` or `sathi=debug`.
    pub default_filter: String,
}

impl LogSettings {
    /// Settings derived from the loaded configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            file: config.log_file.clone(),
            default_filter: config.log_level.clone(),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.default_filter))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Configure tracing subscribers for stdout and file logging.
///
/// - `RUST_LOG` wins over [`LogSettings::default_filter`].
/// - A file that cannot be opened leaves stdout logging in place.
/// - The non-blocking writer's guard lives for the rest of the process.
pub fn init_tracing(settings: &LogSettings) {
    let stdout_layer = fmt::layer().with_target(false).compact();
    let registry = tracing_subscriber::registry()
        .with(settings.env_filter())
        .with(stdout_layer);

    match file_writer(&settings.file) {
        Ok((writer, guard)) => {
            let _ = LOG_GUARD.set(guard);
            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact();
            registry.with(file_layer).init();
        }
        Err(err) => {
            eprintln!("Failed to open log file {}: {err}", settings.file.display());
            registry.init();
        }
    }
}

/// Open `path` for appending behind a non-blocking writer, creating parent directories.
fn file_writer(path: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(tracing_appender::non_blocking(file))
}
