//! Wallpaper Service
//!
//! Submission allocates a job id, stores both uploads in a private working
//! directory, records the job as `pending` and enqueues it for the worker.

use dynwall_core::domain::job::{Job, JobStatus};
use std::path::Path;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::context::AppContext;
use crate::queue::QueueError;
use crate::repository::StoreError;

/// One uploaded image
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied file name, used only for its extension
    pub file_name: Option<String>,
    pub data: Vec<u8>,
}

/// Service error type
#[derive(Debug, thiserror::Error)]
pub enum WallpaperError {
    #[error("{0}")]
    Validation(String),

    #[error("wallpaper {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for WallpaperError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WallpaperError::NotFound(id),
            other => WallpaperError::Store(other),
        }
    }
}

/// Create and enqueue a new wallpaper job
pub async fn submit_wallpaper(
    ctx: &AppContext,
    light: Option<UploadedImage>,
    dark: Option<UploadedImage>,
) -> Result<Job, WallpaperError> {
    let (light, dark) = validate_images(light, dark)?;

    let id = Uuid::new_v4();
    let dir = ctx.config.work_root.join(id.to_string());
    tokio::fs::create_dir_all(&dir).await?;

    let light_path = dir.join(input_file_name("light", light.file_name.as_deref()));
    let dark_path = dir.join(input_file_name("dark", dark.file_name.as_deref()));

    if let Err(e) = write_inputs(&light_path, &light, &dark_path, &dark).await {
        discard_dir(&dir).await;
        return Err(e.into());
    }

    let job = Job::new(id, light_path, dark_path);

    if let Err(e) = ctx.store.create(&job).await {
        discard_dir(&dir).await;
        return Err(e.into());
    }

    if let Err(e) = ctx.queue.enqueue(id).await {
        error!("Job {} was recorded but could not be queued: {}", id, e);
        return Err(e.into());
    }

    info!("Wallpaper job created: {}", id);
    Ok(job)
}

/// Get a job by ID
pub async fn get_wallpaper(ctx: &AppContext, id: Uuid) -> Result<Job, WallpaperError> {
    let job = ctx.store.get(id).await?;
    Ok(job)
}

/// Completed jobs, newest first
pub async fn list_gallery(ctx: &AppContext) -> Result<Vec<Job>, WallpaperError> {
    let jobs = ctx.store.list_by_status(JobStatus::Completed).await?;
    Ok(jobs)
}

// =============================================================================
// Helpers
// =============================================================================

fn validate_images(
    light: Option<UploadedImage>,
    dark: Option<UploadedImage>,
) -> Result<(UploadedImage, UploadedImage), WallpaperError> {
    let (Some(light), Some(dark)) = (light, dark) else {
        return Err(WallpaperError::Validation(
            "Both light and dark images are required".to_string(),
        ));
    };

    if light.data.is_empty() || dark.data.is_empty() {
        return Err(WallpaperError::Validation(
            "Uploaded images must not be empty".to_string(),
        ));
    }

    Ok((light, dark))
}

/// `<prefix>.<ext>` using the upload's extension when it looks sane.
///
/// Only the extension of the client file name is kept.
fn input_file_name(prefix: &str, original: Option<&str>) -> String {
    let ext = original
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty() && ext.len() <= 10)
        .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));

    match ext {
        Some(ext) => format!("{}.{}", prefix, ext.to_ascii_lowercase()),
        None => prefix.to_string(),
    }
}

async fn write_inputs(
    light_path: &Path,
    light: &UploadedImage,
    dark_path: &Path,
    dark: &UploadedImage,
) -> std::io::Result<()> {
    tokio::fs::write(light_path, &light.data).await?;
    tokio::fs::write(dark_path, &dark.data).await?;
    Ok(())
}

async fn discard_dir(dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(dir).await {
        warn!("Failed to remove working directory {}: {}", dir.display(), e);
    }
}
