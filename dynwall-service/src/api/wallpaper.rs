//! Wallpaper API Handlers
//!
//! HTTP endpoints for submitting jobs and reading their results.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use dynwall_core::domain::job::Job;
use dynwall_core::dto::job::JobCreated;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::context::AppContext;
use crate::service::wallpaper_service::{self, UploadedImage};

/// POST /api/create
/// Multipart form with `light` and `dark` image fields
pub async fn create_wallpaper(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> ApiResult<Json<JobCreated>> {
    let mut light = None;
    let mut dark = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {}", e)))?
    {
        let slot = match field.name() {
            Some("light") if light.is_none() => &mut light,
            Some("dark") if dark.is_none() => &mut dark,
            _ => continue,
        };

        let file_name = field.file_name().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Invalid form data: {}", e)))?;

        *slot = Some(UploadedImage {
            file_name,
            data: data.to_vec(),
        });
    }

    tracing::info!("Submitting wallpaper job");

    let job = wallpaper_service::submit_wallpaper(&ctx, light, dark).await?;

    Ok(Json(JobCreated { id: job.id }))
}

/// GET /api/status/{id}
pub async fn get_status(
    State(ctx): State<AppContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Job>> {
    tracing::debug!("Getting wallpaper: {}", id);

    let job = wallpaper_service::get_wallpaper(&ctx, id).await?;
    Ok(Json(job))
}

/// GET /api/gallery
/// Completed wallpapers, newest first
pub async fn get_gallery(State(ctx): State<AppContext>) -> ApiResult<Json<Vec<Job>>> {
    tracing::debug!("Listing gallery");

    let jobs = wallpaper_service::list_gallery(&ctx).await?;
    Ok(Json(jobs))
}
