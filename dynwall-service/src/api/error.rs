//! API Error Handling
//!
//! Unified error types and conversion for API responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::service::wallpaper_service::WallpaperError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    InternalError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<WallpaperError> for ApiError {
    fn from(err: WallpaperError) -> Self {
        match err {
            WallpaperError::Validation(msg) => ApiError::BadRequest(msg),
            WallpaperError::NotFound(_) => ApiError::NotFound("Wallpaper not found".to_string()),
            WallpaperError::Store(err) => {
                tracing::error!("Database error: {}", err);
                ApiError::InternalError("Internal server error".to_string())
            }
            WallpaperError::Queue(err) => {
                tracing::error!("Queue error: {}", err);
                ApiError::InternalError("Job could not be queued".to_string())
            }
            WallpaperError::Io(err) => {
                tracing::error!("I/O error: {}", err);
                ApiError::InternalError("Could not store uploaded images".to_string())
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
