//! Crop save and read-back routes
//!
//! - `POST /save-crop/`: upload a crop image to object storage, then append
//!   its URL to the aggregate row for the taxonomy tuple
//! - `GET /get-images/`: full aggregate for a tuple
//! - `GET /get-images-by-category/`: one category's URLs
//! - `GET /get-signed-url/`: presigned GET URL for a stored object

use axum::{
    extract::{DefaultBodyLimit, Multipart, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::crops::{AggregateView, CropCategory, CropRepository, TaxonomyKey};
use crate::error::{AppError, Result};
use crate::state::AppState;

const MAX_CROP_BYTES: usize = 32 * 1024 * 1024;

#[derive(Serialize)]
pub struct SaveCropResponse {
    pub status: &'static str,
    pub s3_url: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryQuery {
    pub class_id: i64,
    pub subject_id: i64,
    pub course_id: i64,
    pub module_id: i64,
    pub category: String,
}

#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    pub key: String,
    pub expires_in: Option<u64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/save-crop/", post(save_crop))
        .route("/get-images/", get(get_images))
        .route("/get-images-by-category/", get(get_images_by_category))
        .route("/get-signed-url/", get(get_signed_url))
        .layer(DefaultBodyLimit::max(MAX_CROP_BYTES))
}

/// Form fields of the save-crop multipart request
#[derive(Default)]
struct SaveCropForm {
    file: Option<Vec<u8>>,
    page: Option<i64>,
    category: Option<String>,
    pdf_name: Option<String>,
    class_id: Option<i64>,
    subject_id: Option<i64>,
    course_id: Option<i64>,
    module_id: Option<i64>,
    folder: Option<String>,
}

impl SaveCropForm {
    async fn from_multipart(mut multipart: Multipart) -> Result<Self> {
        let mut form = SaveCropForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::Validation(format!("Malformed multipart request: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    let data = field.bytes().await.map_err(|e| {
                        AppError::Validation(format!("Failed to read crop image: {}", e))
                    })?;
                    form.file = Some(data.to_vec());
                }
                "page" => form.page = Some(int_field(field, "page").await?),
                "category" => form.category = Some(text_field(field, "category").await?),
                "pdf_name" => form.pdf_name = Some(text_field(field, "pdf_name").await?),
                "class_id" => form.class_id = Some(int_field(field, "class_id").await?),
                "subject_id" => form.subject_id = Some(int_field(field, "subject_id").await?),
                "course_id" => form.course_id = Some(int_field(field, "course_id").await?),
                "module_id" => form.module_id = Some(int_field(field, "module_id").await?),
                "folder" => form.folder = Some(text_field(field, "folder").await?),
                _ => {}
            }
        }

        Ok(form)
    }
}

async fn text_field(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<String> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read field '{}': {}", name, e)))
}

async fn int_field(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<i64> {
    let text = text_field(field, name).await?;
    text.parse()
        .map_err(|_| AppError::Validation(format!("Field '{}' must be an integer, got '{}'", name, text)))
}

fn require<T>(value: Option<T>, name: &str) -> Result<T> {
    value.ok_or_else(|| AppError::Validation(format!("Missing required field '{}'", name)))
}

/// POST /save-crop/
///
/// Validation happens before the storage upload, and the storage upload
/// before the database append: an invalid request touches neither external
/// service, and a storage failure aborts the save before any row is written.
async fn save_crop(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<SaveCropResponse>> {
    let form = SaveCropForm::from_multipart(multipart).await?;

    let category_raw = require(form.category, "category")?;
    let category = CropCategory::parse(&category_raw).ok_or_else(|| {
        AppError::Validation(format!(
            "Invalid category '{}'; expected one of tables, equations, diagrams, others",
            category_raw
        ))
    })?;

    let pdf_name = require(form.pdf_name, "pdf_name")?;
    if !pdf_name.ends_with(".pdf") {
        return Err(AppError::Validation(format!(
            "Expected a .pdf filename, got '{}'",
            pdf_name
        )));
    }

    let file = require(form.file, "file")?;
    if file.is_empty() {
        return Err(AppError::Validation("Crop image is empty".to_string()));
    }

    let page = require(form.page, "page")?;
    let folder = require(form.folder, "folder")?;
    let key = TaxonomyKey {
        class_id: require(form.class_id, "class_id")?,
        subject_id: require(form.subject_id, "subject_id")?,
        course_id: require(form.course_id, "course_id")?,
        module_id: require(form.module_id, "module_id")?,
    };

    // Storage first. If the upload fails nothing reaches the database; if
    // the append below fails the uploaded object is orphaned (accepted gap).
    let suggested_name = format!("{}/crop_{}_{}.png", folder, category, Utc::now().timestamp());
    let uploaded = state.s3_client().upload(file, &suggested_name).await?;

    let repo = CropRepository::new(state.db());
    repo.append_crop_url(key, category, &uploaded.url).await?;

    tracing::info!(
        "Saved {} crop from page {} of {} for tuple ({}, {}, {}, {})",
        category,
        page,
        pdf_name,
        key.class_id,
        key.subject_id,
        key.course_id,
        key.module_id
    );

    Ok(Json(SaveCropResponse {
        status: "success",
        s3_url: uploaded.url,
        message: format!("Crop saved under category '{}'", category),
    }))
}

/// GET /get-images/
async fn get_images(
    State(state): State<AppState>,
    Query(key): Query<TaxonomyKey>,
) -> Result<Json<AggregateView>> {
    let repo = CropRepository::new(state.db());
    let aggregate = repo.get_aggregate(key).await?;
    Ok(Json(aggregate))
}

/// GET /get-images-by-category/
async fn get_images_by_category(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<serde_json::Value>> {
    let category = CropCategory::parse(&query.category).ok_or_else(|| {
        AppError::Validation(format!(
            "Invalid category '{}'; expected one of tables, equations, diagrams, others",
            query.category
        ))
    })?;

    let key = TaxonomyKey {
        class_id: query.class_id,
        subject_id: query.subject_id,
        course_id: query.course_id,
        module_id: query.module_id,
    };

    let repo = CropRepository::new(state.db());
    let urls = repo.get_category(key, category).await?;
    let count = urls.len();

    Ok(Json(json!({
        category.as_str(): urls,
        "count": count,
    })))
}

/// GET /get-signed-url/
async fn get_signed_url(
    State(state): State<AppState>,
    Query(query): Query<SignedUrlQuery>,
) -> Result<Json<serde_json::Value>> {
    let expires_in = query.expires_in.unwrap_or(60);
    let url = state
        .s3_client()
        .presigned_get_url(&query.key, expires_in)
        .await?;

    Ok(Json(json!({ "url": url })))
}
