//! PDF upload and page rendering routes
//!
//! - `POST /upload-pdf`: store an uploaded PDF in the local uploads dir
//! - `GET /get-page`: render one page as PNG
//! - `GET /get-total-pages`: page count of an uploaded PDF

use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::pdf;
use crate::state::AppState;

/// Default render zoom, matching the cropping UI's preview scale
const DEFAULT_ZOOM: f32 = 2.0;

/// Allow large lecture PDFs
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

#[derive(Serialize)]
pub struct UploadPdfResponse {
    pub status: &'static str,
    pub filename: String,
}

#[derive(Serialize)]
pub struct TotalPagesResponse {
    pub total_pages: usize,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: i32,
    pub pdf_name: String,
    pub zoom: Option<f32>,
}

#[derive(Debug, Deserialize)]
pub struct PdfNameQuery {
    pub pdf_name: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/upload-pdf", post(upload_pdf))
        .route("/get-page", get(get_page))
        .route("/get-total-pages", get(get_total_pages))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

/// Reject names that are not plain `.pdf` filenames.
///
/// Uploaded names are written into the uploads directory, so path
/// separators and parent references are refused outright.
fn validate_pdf_name(name: &str) -> Result<()> {
    if !name.ends_with(".pdf") || name.len() == ".pdf".len() {
        return Err(AppError::Validation(format!(
            "Expected a .pdf filename, got '{}'",
            name
        )));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::Validation(format!(
            "Invalid PDF filename: '{}'",
            name
        )));
    }
    Ok(())
}

fn pdf_path(state: &AppState, pdf_name: &str) -> Result<PathBuf> {
    validate_pdf_name(pdf_name)?;
    Ok(state.config().uploads.dir.join(pdf_name))
}

/// POST /upload-pdf
async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadPdfResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart request: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .ok_or_else(|| AppError::Validation("Upload is missing a filename".to_string()))?;
        validate_pdf_name(&filename)?;

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {}", e)))?;
        if data.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }

        let path = state.config().uploads.dir.join(&filename);
        tokio::fs::write(&path, &data).await?;
        tracing::info!("Stored uploaded PDF {} ({} bytes)", filename, data.len());

        return Ok(Json(UploadPdfResponse {
            status: "uploaded",
            filename,
        }));
    }

    Err(AppError::Validation(
        "Multipart request has no 'file' field".to_string(),
    ))
}

/// GET /get-page
async fn get_page(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Result<Response> {
    let path = pdf_path(&state, &query.pdf_name)?;
    let zoom = query.zoom.unwrap_or(DEFAULT_ZOOM);

    let rendered = pdf::render_page(path, query.page, zoom).await?;
    tracing::debug!(
        "Rendered page {} of {} at zoom {} ({}x{})",
        query.page,
        query.pdf_name,
        zoom,
        rendered.width,
        rendered.height
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .body(Body::from(rendered.data))
        .unwrap();

    Ok(response)
}

/// GET /get-total-pages
async fn get_total_pages(
    State(state): State<AppState>,
    Query(query): Query<PdfNameQuery>,
) -> Result<Json<TotalPagesResponse>> {
    let path = pdf_path(&state, &query.pdf_name)?;
    let total_pages = pdf::page_count(path).await?;

    Ok(Json(TotalPagesResponse { total_pages }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_pdf_names() {
        assert!(validate_pdf_name("lecture1.pdf").is_ok());
        assert!(validate_pdf_name("a b c.pdf").is_ok());
    }

    #[test]
    fn rejects_non_pdf_and_traversal_names() {
        assert!(validate_pdf_name("notes.txt").is_err());
        assert!(validate_pdf_name(".pdf").is_err());
        assert!(validate_pdf_name("").is_err());
        assert!(validate_pdf_name("../escape.pdf").is_err());
        assert!(validate_pdf_name("dir/inner.pdf").is_err());
        assert!(validate_pdf_name("dir\\inner.pdf").is_err());
    }
}
