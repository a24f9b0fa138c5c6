//! Artifact publisher
//!
//! Uploads stage artifacts to object storage and derives their public URLs.
//! Keys are namespaced by artifact kind and job id so jobs never collide:
//! `wallpapers/<id>.heic` and `previews/<id>.jpg`.

mod s3;

pub use s3::S3ObjectStore;

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::pipeline::{Artifact, ArtifactKind};

/// Upload failure reported by an object store
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct UploadError(pub String);

/// Publish error type
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// Required storage setting is missing
    #[error("storage configuration error: {0}")]
    Config(String),

    #[error("upload of {key} failed: {source}")]
    Upload {
        key: String,
        #[source]
        source: UploadError,
    },
}

/// Durable object storage
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads the file at `path` under `key`
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<(), UploadError>;
}

/// Object key for an artifact of a job
pub fn object_key(kind: ArtifactKind, job_id: Uuid) -> String {
    match kind {
        ArtifactKind::Wallpaper => format!("wallpapers/{}.heic", job_id),
        ArtifactKind::Preview => format!("previews/{}.jpg", job_id),
    }
}

pub fn content_type(kind: ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Wallpaper => "image/heic",
        ArtifactKind::Preview => "image/jpeg",
    }
}

pub struct ArtifactPublisher {
    store: Arc<dyn ObjectStore>,
    bucket: Option<String>,
    public_url: Option<String>,
}

impl ArtifactPublisher {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        bucket: Option<String>,
        public_url: Option<String>,
    ) -> Self {
        Self {
            store,
            bucket,
            public_url,
        }
    }

    pub fn from_config(store: Arc<dyn ObjectStore>, config: &StorageConfig) -> Self {
        Self::new(store, config.bucket.clone(), config.public_url.clone())
    }

    /// Uploads one artifact and returns its public URL
    pub async fn publish(&self, job_id: Uuid, artifact: &Artifact) -> Result<String, PublishError> {
        // Both settings must be present before anything is uploaded.
        let bucket = self
            .bucket
            .as_deref()
            .ok_or_else(|| PublishError::Config("R2_BUCKET_NAME is not set".to_string()))?;
        let public_url = self
            .public_url
            .as_deref()
            .ok_or_else(|| PublishError::Config("R2_PUBLIC_URL is not set".to_string()))?;

        let key = object_key(artifact.kind, job_id);
        info!("Uploading {} to {}/{}", artifact.path.display(), bucket, key);

        self.store
            .put_object(bucket, &key, &artifact.path, content_type(artifact.kind))
            .await
            .map_err(|source| PublishError::Upload {
                key: key.clone(),
                source,
            })?;

        let url = public_object_url(public_url, &key);
        info!("Successfully uploaded. URL: {}", url);
        Ok(url)
    }
}

/// `<base>/<key>`, tolerating a trailing slash on the base
pub fn public_object_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}
