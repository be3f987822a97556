//! Application state management

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::storage::S3Client;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    s3_client: S3Client,
    db: SqlitePool,
}

impl AppState {
    pub fn new(config: Config, s3_client: S3Client, db: SqlitePool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                s3_client,
                db,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn s3_client(&self) -> &S3Client {
        &self.inner.s3_client
    }

    pub fn db(&self) -> &SqlitePool {
        &self.inner.db
    }

    /// Close the database pool. Called on graceful shutdown.
    pub async fn shutdown(&self) {
        tracing::info!("Closing database pool...");
        self.inner.db.close().await;
    }
}
