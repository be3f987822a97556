//! PDF Crop Server entry point

use std::net::SocketAddr;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdf_crop_server::config::Config;
use pdf_crop_server::state::AppState;
use pdf_crop_server::storage::S3Client;
use pdf_crop_server::{app, db};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdf_crop_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration; missing S3 settings are fatal
    dotenvy::dotenv().ok();
    let config = Config::from_env().context("Failed to load configuration from environment")?;

    tracing::info!("Starting PDF Crop Server v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("S3 bucket: {}", config.storage.bucket);
    if let Some(endpoint) = &config.storage.endpoint {
        tracing::info!("S3 endpoint: {}", endpoint);
    }

    // Local directory for uploaded PDFs
    tokio::fs::create_dir_all(&config.uploads.dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.uploads.dir.display()))?;

    // Initialize S3 client
    let s3_client = S3Client::new(&config.storage)
        .await
        .context("Failed to initialize S3 client")?;

    // Initialize database
    let db_pool = db::create_pool(&config.database.url)
        .await
        .context("Failed to initialize database")?;
    tracing::info!("Database initialized at {}", config.database.url);

    let state = AppState::new(config.clone(), s3_client, db_pool);
    let router = app(state.clone());

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    tracing::info!("PDF Crop Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind server address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    state.shutdown().await;
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
