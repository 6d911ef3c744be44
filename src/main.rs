use anyhow::{Context, Result};
use clap::Parser;
use sathi::logging::{self, LogSettings};
use sathi::{api, assistant::Assistant, config, uploads::UploadSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;

/// SATHI hospitality assistant HTTP server.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Port to listen on (overrides SERVER_PORT).
    #[arg(long)]
    port: Option<u16>,
    /// Directory with the static front-end (overrides FRONTEND_DIR).
    #[arg(long)]
    frontend_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load configuration")?;
    logging::init_tracing(&LogSettings::from_config(&config));
    tracing::debug!(
        chat_api_url = %config.chat_api_url,
        chat_model = %config.chat_model,
        upload_dir = %config.upload_dir.display(),
        upload_max_bytes = config.upload_max_bytes,
        server_port = ?config.server_port,
        "Loaded configuration"
    );

    let uploads = UploadSettings::from_config(&config);
    uploads
        .ensure_dir()
        .with_context(|| format!("failed to create {}", uploads.dir.display()))?;
    let frontend_dir = cli
        .frontend_dir
        .unwrap_or_else(|| config.frontend_dir.clone());

    let assistant =
        Assistant::from_config(&config).context("failed to build completion client")?;
    let app = api::create_app(Arc::new(assistant), uploads, &frontend_dir);

    let (listener, port) = bind_listener(cli.port.or(config.server_port))
        .await
        .context("failed to bind listener")?;
    tracing::info!(frontend = %frontend_dir.display(), "Listening on http://0.0.0.0:{}", port);
    axum::serve(listener, app)
        .await
        .context("server terminated unexpectedly")?;
    Ok(())
}

async fn bind_listener(port: Option<u16>) -> Result<(TcpListener, u16), std::io::Error> {
    use std::net::Ipv4Addr;

    if let Some(port) = port {
        return TcpListener::bind((Ipv4Addr::UNSPECIFIED, port))
            .await
            .map(|listener| (listener, port));
    }

    const PORT_RANGE: std::ops::RangeInclusive<u16> = 5000..=5099;
    for port in PORT_RANGE {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => {
                tracing::debug!(port, "Bound server port");
                return Ok((listener, port));
            }
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port already in use; trying next");
                continue;
            }
            Err(err) => return Err(err),
        }
    }

    Err(std::io::Error::new(
        std::io::ErrorKind::AddrNotAvailable,
        "No available port found in range 5000-5099",
    ))
}
