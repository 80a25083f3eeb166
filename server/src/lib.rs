//! HTTP boundary for the Mosaic pipeline.
//!
//! One endpoint accepts a bounded multipart upload of images and returns the
//! rendered clustering document synchronously. All upload validation (count,
//! per-file size, content type, decodability) happens here, before anything
//! reaches the pipeline; pipeline errors are translated to status codes here
//! and nowhere else.

use std::sync::Arc;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing::error;

use mosaic_pipeline::{
    Clusterer, Describer, Embedder, ImageItem, JsonRenderer, Renderer, run_pipeline,
};

/// Upload limits enforced before the pipeline runs.
#[derive(Debug, Clone, Copy)]
pub struct UploadLimits {
    /// Maximum number of images per request.
    pub max_images: usize,

    /// Maximum size of a single uploaded file, in bytes.
    pub max_file_bytes: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_images: 24,
            max_file_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Shared state: the pipeline stages behind trait objects, so any
/// implementation of the capabilities can back the API.
#[derive(Clone)]
pub struct AppState {
    pub embedder: Arc<dyn Embedder>,
    pub clusterer: Arc<dyn Clusterer>,
    pub describer: Arc<dyn Describer>,
    pub limits: UploadLimits,
}

/// An API error: a status code plus a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            detail: detail.into(),
        }
    }

    fn payload_too_large(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            detail: detail.into(),
        }
    }

    fn internal(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: detail.into(),
        }
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "detail": self.detail }));
        (self.status, body).into_response()
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    // The per-file limit is enforced by hand below; the transport-level
    // limit only has to admit a full batch of maximum-size files.
    let body_limit = state.limits.max_images * state.limits.max_file_bytes + 1024 * 1024;

    Router::new()
        .route("/health", get(health))
        .route("/cluster-images", post(cluster_images))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Receive a batch of images, cluster them, and return the rendered JSON
/// document.
async fn cluster_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut images: Vec<ImageItem> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("Malformed multipart body: {err}")))?
    {
        if images.len() >= state.limits.max_images {
            return Err(ApiError::bad_request(format!(
                "Too many files uploaded. Maximum allowed is {}.",
                state.limits.max_images
            )));
        }

        let filename = field.file_name().unwrap_or("upload").to_string();

        let content_type = field.content_type().unwrap_or("").to_string();
        if !content_type.starts_with("image/") {
            return Err(ApiError::bad_request(format!(
                "Invalid file type: {filename}"
            )));
        }

        let bytes = field
            .bytes()
            .await
            .map_err(|err| ApiError::bad_request(format!("Failed to read {filename}: {err}")))?;

        if bytes.len() > state.limits.max_file_bytes {
            let max_mb = state.limits.max_file_bytes as f64 / (1024.0 * 1024.0);
            return Err(ApiError::payload_too_large(format!(
                "File too large: {filename}. Maximum allowed size is {max_mb:.1} MB."
            )));
        }

        let decoded = image::load_from_memory(&bytes)
            .map_err(|_| ApiError::bad_request(format!("Cannot open image: {filename}")))?;

        images.push(ImageItem::new(filename, decoded));
    }

    if images.is_empty() {
        return Err(ApiError::bad_request("No files uploaded"));
    }

    let clusters = run_pipeline(
        images,
        state.embedder.as_ref(),
        state.clusterer.as_ref(),
        state.describer.as_ref(),
    )
    .await
    .map_err(|err| {
        error!("Pipeline failed: {err:#}");
        ApiError::internal("Clustering pipeline failed")
    })?;

    let rendered = JsonRenderer::new().render(&clusters).map_err(|err| {
        error!("Rendering failed: {err:#}");
        ApiError::internal("Failed to render clusters")
    })?;
    let document: serde_json::Value = serde_json::from_str(&rendered)
        .map_err(|err| ApiError::internal(format!("Invalid rendered document: {err}")))?;

    Ok(Json(document))
}
