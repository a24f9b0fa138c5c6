//! Job lifecycle controller
//!
//! Pops job ids off the queue one at a time and drives each job through
//! `processing` to `completed` or `failed`. A failing job never takes the
//! loop down with it; only queue transport errors are retried, after a fixed
//! delay.

use dynwall_core::domain::job::JobStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{CleanupPolicy, Config};
use crate::pipeline::{ArtifactKind, Pipeline, StageFailure, Workspace};
use crate::queue::{JobQueue, QueueError};
use crate::repository::JobStore;
use crate::storage::{ArtifactPublisher, PublishError};

/// Loop timing and failure policy
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub dequeue_timeout: Duration,
    pub retry_delay: Duration,
    pub completion_retries: u32,
    pub cleanup_policy: CleanupPolicy,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dequeue_timeout: config.dequeue_timeout,
            retry_delay: config.queue_retry_delay,
            completion_retries: config.completion_retries,
            cleanup_policy: config.cleanup_policy,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// How one delivery ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed,
    /// The record could not be loaded or moved to `processing`
    Abandoned,
    /// The job was already terminal when delivered again
    Skipped,
    /// Artifacts were published but the completion write never succeeded;
    /// the record stays `processing`
    Stuck,
}

#[derive(Debug, thiserror::Error)]
enum JobError {
    #[error(transparent)]
    Stage(#[from] StageFailure),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error("pipeline produced no wallpaper artifact")]
    NoWallpaper,
}

/// Result URLs of a processed job
#[derive(Debug, Default)]
struct PublishedUrls {
    final_url: Option<String>,
    preview_url: Option<String>,
}

pub struct LifecycleController {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    pipeline: Pipeline,
    publisher: ArtifactPublisher,
    settings: WorkerSettings,
}

impl LifecycleController {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        pipeline: Pipeline,
        publisher: ArtifactPublisher,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            store,
            queue,
            pipeline,
            publisher,
            settings,
        }
    }

    /// Runs the dequeue loop until `shutdown` is cancelled.
    ///
    /// Cancellation interrupts the blocking wait and the retry delay, never a
    /// job in progress.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(
            "Starting worker loop (stages: {:?}, dequeue timeout: {:?})",
            self.pipeline.stage_names(),
            self.settings.dequeue_timeout
        );

        loop {
            let delivery = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                delivery = self.queue.dequeue_blocking(self.settings.dequeue_timeout) => delivery,
            };

            match delivery {
                Ok(Some(id)) => {
                    let outcome = self.process_job(id).await;
                    debug!("Job {} delivery ended as {:?}", id, outcome);
                }
                Ok(None) => debug!("No jobs available"),
                Err(QueueError::MalformedPayload(payload)) => {
                    warn!("Dropping malformed queue payload '{}'", payload);
                }
                Err(e) => {
                    error!("Error pulling job from queue: {}", e);
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.settings.retry_delay) => {}
                    }
                }
            }
        }

        info!("Worker loop stopped");
    }

    /// Processes a single delivery of `id`
    pub async fn process_job(&self, id: Uuid) -> JobOutcome {
        info!("Processing job {}", id);

        let job = match self.store.get(id).await {
            Ok(job) => job,
            Err(e) => {
                error!("Error finding job {}: {}", id, e);
                return JobOutcome::Abandoned;
            }
        };

        if job.status.is_terminal() {
            warn!(
                "Job {} is already {}, ignoring repeated delivery",
                id, job.status
            );
            return JobOutcome::Skipped;
        }

        if let Err(e) = self.store.update_status(id, JobStatus::Processing).await {
            error!("Failed to mark job {} as processing: {}", id, e);
            return JobOutcome::Abandoned;
        }

        let workspace = Workspace::for_job(&job);

        let urls = match self.execute(&workspace).await {
            Ok(urls) => urls,
            Err(e) => {
                error!("Job {} failed: {}", id, e);
                return self.fail(&workspace).await;
            }
        };

        let Some(final_url) = urls.final_url else {
            error!("Job {} failed: {}", id, JobError::NoWallpaper);
            return self.fail(&workspace).await;
        };

        if !self
            .write_completion(id, &final_url, urls.preview_url.as_deref())
            .await
        {
            error!(
                "Job {} is stuck in processing: artifacts are published but the record could not be completed",
                id
            );
            return JobOutcome::Stuck;
        }

        self.remove_workspace(&workspace).await;
        info!("Finished job {}", id);
        JobOutcome::Completed
    }

    /// Runs the stages, then publishes every artifact in production order
    async fn execute(&self, workspace: &Workspace) -> Result<PublishedUrls, JobError> {
        let artifacts = self.pipeline.run(workspace).await?;

        let mut urls = PublishedUrls::default();
        for artifact in &artifacts {
            let url = self.publisher.publish(workspace.job_id, artifact).await?;
            match artifact.kind {
                ArtifactKind::Wallpaper => urls.final_url = Some(url),
                ArtifactKind::Preview => urls.preview_url = Some(url),
            }
        }

        Ok(urls)
    }

    async fn fail(&self, workspace: &Workspace) -> JobOutcome {
        if let Err(e) = self
            .store
            .update_status(workspace.job_id, JobStatus::Failed)
            .await
        {
            error!("Failed to mark job {} as failed: {}", workspace.job_id, e);
        }

        if self.settings.cleanup_policy.removes_failed() {
            self.remove_workspace(workspace).await;
        } else {
            info!(
                "Keeping working directory {} of failed job {}",
                workspace.dir.display(),
                workspace.job_id
            );
        }

        JobOutcome::Failed
    }

    /// Attempts the completion write, retrying with the fixed delay
    async fn write_completion(&self, id: Uuid, final_url: &str, preview_url: Option<&str>) -> bool {
        let attempts = self.settings.completion_retries + 1;

        for attempt in 1..=attempts {
            match self
                .store
                .update_completion(id, final_url, preview_url)
                .await
            {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        "Failed to update job {} to completed (attempt {}/{}): {}",
                        id, attempt, attempts, e
                    );
                    if attempt < attempts {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }

        false
    }

    async fn remove_workspace(&self, workspace: &Workspace) {
        if let Err(e) = tokio::fs::remove_dir_all(&workspace.dir).await {
            warn!(
                "Failed to clean up working directory {}: {}",
                workspace.dir.display(),
                e
            );
        }
    }
}
