//! PDF Crop Server
//!
//! An HTTP backend for extracting categorized crops from lecture PDFs:
//! upload a PDF, render its pages as images, and save cropped regions to
//! S3-compatible storage, indexed by a four-level academic taxonomy.

pub mod config;
pub mod crops;
pub mod db;
pub mod error;
pub mod pdf;
pub mod routes;
pub mod state;
pub mod storage;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use state::AppState;

/// Build the application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .merge(routes::pdfs::router())
        .merge(routes::crops::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
