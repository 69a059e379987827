mod app;
mod cache;
mod config;
mod context;
mod handlers;
mod state;
mod storage;

use anyhow::Result;
use clap::Parser;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    app::create_app,
    config::{CacheBackend, Config, StorageBackend},
    state::AppState,
};

/// Lexikon - Dictionary service with a cache-consistent storage layer
#[derive(Parser, Debug)]
#[command(name = "lexikon")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "3000", env = "PORT")]
    port: u16,

    /// Repository backend
    #[arg(long, env = "STORAGE_BACKEND", ignore_case = true)]
    storage: Option<StorageBackend>,

    /// Cache backend
    #[arg(long, env = "CACHE_BACKEND", ignore_case = true)]
    cache: Option<CacheBackend>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing();

    let mut config = Config::from_env();
    if let Some(backend) = cli.storage {
        config.storage.backend = backend;
    }
    if let Some(backend) = cli.cache {
        config.cache.backend = backend;
    }

    let state = AppState::new(&config).await?;

    // Build the application router
    let app = create_app(state.clone());

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(
        storage = %config.storage.backend,
        env = %config.env,
        "listening on {}",
        listener.local_addr()?
    );

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.close().await;

    tracing::info!("Server stopped");
    Ok(())
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` selects the filter; `LOG_FORMAT=json` switches to JSON lines.
fn init_tracing() {
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexikon=debug,tower_http=debug".into()),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(|| tracing_subscriber::fmt::layer()))
        .init();
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_backend_flags() {
        let cli = Cli::try_parse_from([
            "lexikon", "--storage", "sqlite", "--cache", "REDIS", "-p", "8080",
        ])
        .unwrap();

        assert_eq!(cli.storage, Some(StorageBackend::Sqlite));
        assert_eq!(cli.cache, Some(CacheBackend::Redis));
        assert_eq!(cli.port, 8080);
    }

    #[test]
    fn test_cli_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["lexikon", "--storage", "mongo"]).is_err());
    }
}
