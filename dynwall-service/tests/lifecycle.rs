mod common;

use async_trait::async_trait;
use common::{Harness, PUBLIC_URL, assert_forward_only};
use dynwall_core::domain::job::JobStatus;
use dynwall_service::config::CleanupPolicy;
use dynwall_service::queue::{InMemoryJobQueue, JobQueue, QueueError};
use dynwall_service::repository::JobStore;
use dynwall_service::worker::JobOutcome;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

async fn next_delivery(harness: &Harness) -> Uuid {
    harness
        .queue
        .dequeue_blocking(Duration::from_millis(50))
        .await
        .unwrap()
        .expect("a queued job id")
}

#[tokio::test]
async fn submitted_job_completes_end_to_end() {
    let harness = Harness::new();
    let job = harness.submit("a.png", "a_dark.png").await;
    assert_eq!(harness.job(&job).await.status, JobStatus::Pending);
    assert!(job.working_dir().is_dir());

    let id = next_delivery(&harness).await;
    assert_eq!(id, job.id);

    let outcome = harness.controller().process_job(id).await;
    assert_eq!(outcome, JobOutcome::Completed);

    let done = harness.job(&job).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(
        done.final_url,
        Some(format!("{}/wallpapers/{}.heic", PUBLIC_URL, job.id))
    );
    assert_eq!(
        done.preview_url,
        Some(format!("{}/previews/{}.jpg", PUBLIC_URL, job.id))
    );
    assert!(!job.working_dir().exists());

    assert_eq!(harness.tools.programs(), vec!["exiv2", "heif-enc", "magick"]);
    let encode_args = harness.tools.args_of("heif-enc").unwrap();
    assert_eq!(encode_args[0], "-L");
    assert_eq!(
        harness.objects.keys(),
        vec![
            format!("wallpapers/{}.heic", job.id),
            format!("previews/{}.jpg", job.id)
        ]
    );

    let history = harness.store.status_history(job.id);
    assert_eq!(
        history,
        vec![
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed
        ]
    );
    assert_forward_only(&history);
}

#[tokio::test]
async fn jpeg_input_is_encoded_without_lossless_flag() {
    let harness = Harness::new();
    let job = harness.submit("day.jpg", "night.jpg").await;

    harness.controller().process_job(job.id).await;

    let encode_args = harness.tools.args_of("heif-enc").unwrap();
    assert!(!encode_args.contains(&"-L".to_string()));
}

#[tokio::test]
async fn encode_failure_marks_job_failed_without_publishing() {
    let harness = Harness::new();
    harness.tools.fail("heif-enc");
    let job = harness.submit("a.png", "a_dark.png").await;

    let outcome = harness.controller().process_job(job.id).await;
    assert_eq!(outcome, JobOutcome::Failed);

    let failed = harness.job(&job).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.final_url.is_none());
    assert!(failed.preview_url.is_none());

    assert!(harness.objects.keys().is_empty());
    assert_eq!(harness.tools.programs(), vec!["exiv2", "heif-enc"]);
    assert_forward_only(&harness.store.status_history(job.id));

    // Default policy keeps failed inputs around
    assert!(job.working_dir().is_dir());
    assert!(job.light_input_path.is_file());
}

#[tokio::test]
async fn metadata_failure_stops_pipeline_before_encode() {
    let harness = Harness::new();
    harness.tools.fail("exiv2");
    let job = harness.submit("a.png", "a_dark.png").await;

    let outcome = harness.controller().process_job(job.id).await;

    assert_eq!(outcome, JobOutcome::Failed);
    assert_eq!(harness.tools.programs(), vec!["exiv2"]);
    assert!(harness.objects.keys().is_empty());
}

#[tokio::test]
async fn always_cleanup_policy_removes_failed_workdir() {
    let harness = Harness::with_config(|config| config.cleanup_policy = CleanupPolicy::Always);
    harness.tools.fail("heif-enc");
    let job = harness.submit("a.png", "a_dark.png").await;

    let outcome = harness.controller().process_job(job.id).await;

    assert_eq!(outcome, JobOutcome::Failed);
    assert!(!job.working_dir().exists());
}

#[tokio::test]
async fn primary_publish_failure_never_completes() {
    let harness = Harness::new();
    harness.objects.fail_prefix("wallpapers/");
    let job = harness.submit("a.png", "a_dark.png").await;

    let outcome = harness.controller().process_job(job.id).await;
    assert_eq!(outcome, JobOutcome::Failed);

    let failed = harness.job(&job).await;
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.final_url.is_none());
    assert!(
        !harness
            .store
            .status_history(job.id)
            .contains(&JobStatus::Completed)
    );
    // The preview is published after the wallpaper, so it never goes out
    assert!(harness.objects.keys().is_empty());
}

#[tokio::test]
async fn preview_publish_failure_fails_job() {
    let harness = Harness::new();
    harness.objects.fail_prefix("previews/");
    let job = harness.submit("a.png", "a_dark.png").await;

    let outcome = harness.controller().process_job(job.id).await;

    assert_eq!(outcome, JobOutcome::Failed);
    let failed = harness.job(&job).await;
    assert!(failed.final_url.is_none());
    assert!(failed.preview_url.is_none());
}

#[tokio::test]
async fn missing_storage_config_fails_job_not_process() {
    let harness = Harness::with_config(|config| config.storage.bucket = None);
    let job = harness.submit("a.png", "a_dark.png").await;

    let outcome = harness.controller().process_job(job.id).await;

    assert_eq!(outcome, JobOutcome::Failed);
    assert_eq!(harness.job(&job).await.status, JobStatus::Failed);
    assert!(harness.objects.keys().is_empty());
}

#[tokio::test]
async fn preview_disabled_completes_with_wallpaper_only() {
    let harness = Harness::with_config(|config| config.preview_enabled = false);
    let job = harness.submit("a.png", "a_dark.png").await;

    let outcome = harness.controller().process_job(job.id).await;
    assert_eq!(outcome, JobOutcome::Completed);

    let done = harness.job(&job).await;
    assert!(done.final_url.is_some());
    assert!(done.preview_url.is_none());
    assert_eq!(harness.tools.programs(), vec!["exiv2", "heif-enc"]);
    assert_eq!(
        harness.objects.keys(),
        vec![format!("wallpapers/{}.heic", job.id)]
    );
}

#[tokio::test]
async fn repeated_delivery_of_completed_job_is_skipped() {
    let harness = Harness::new();
    let job = harness.submit("a.png", "a_dark.png").await;
    harness.queue.enqueue(job.id).await.unwrap();

    let controller = harness.controller();
    let first = next_delivery(&harness).await;
    let second = next_delivery(&harness).await;
    assert_eq!(first, second);

    assert_eq!(controller.process_job(first).await, JobOutcome::Completed);
    assert_eq!(controller.process_job(second).await, JobOutcome::Skipped);

    let done = harness.job(&job).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(
        done.final_url,
        Some(format!("{}/wallpapers/{}.heic", PUBLIC_URL, job.id))
    );
    assert_eq!(harness.objects.keys().len(), 2);
    assert_forward_only(&harness.store.status_history(job.id));
}

#[tokio::test]
async fn repeated_delivery_of_failed_job_stays_failed() {
    let harness = Harness::new();
    harness.tools.fail("heif-enc");
    let job = harness.submit("a.png", "a_dark.png").await;

    let controller = harness.controller();
    assert_eq!(controller.process_job(job.id).await, JobOutcome::Failed);
    assert_eq!(controller.process_job(job.id).await, JobOutcome::Skipped);
    assert_eq!(harness.job(&job).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn unknown_job_id_is_abandoned() {
    let harness = Harness::new();

    let outcome = harness.controller().process_job(Uuid::new_v4()).await;

    assert_eq!(outcome, JobOutcome::Abandoned);
    assert!(harness.tools.programs().is_empty());
}

#[tokio::test]
async fn transient_completion_write_failure_is_retried() {
    let harness = Harness::new();
    let job = harness.submit("a.png", "a_dark.png").await;
    harness.store.fail_completions(job.id, 2);

    let outcome = harness.controller().process_job(job.id).await;

    assert_eq!(outcome, JobOutcome::Completed);
    assert_eq!(harness.job(&job).await.status, JobStatus::Completed);
    assert!(!job.working_dir().exists());
}

#[tokio::test]
async fn persistent_completion_write_failure_leaves_job_stuck() {
    let harness = Harness::with_config(|config| config.completion_retries = 1);
    let job = harness.submit("a.png", "a_dark.png").await;
    harness.store.fail_completions(job.id, 10);

    let outcome = harness.controller().process_job(job.id).await;

    assert_eq!(outcome, JobOutcome::Stuck);
    let stuck = harness.job(&job).await;
    assert_eq!(stuck.status, JobStatus::Processing);
    assert!(stuck.final_url.is_none());
    // Artifacts went out and the directory is kept for reconciliation
    assert_eq!(harness.objects.keys().len(), 2);
    assert!(job.working_dir().is_dir());
}

#[tokio::test]
async fn run_loop_processes_jobs_until_shutdown() {
    let harness = Harness::new();
    let controller = Arc::new(harness.controller());
    let shutdown = CancellationToken::new();

    let handle = {
        let controller = Arc::clone(&controller);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { controller.run(shutdown).await })
    };

    let first = harness.submit("a.png", "a_dark.png").await;
    let second = harness.submit("b.jpg", "b_dark.jpg").await;

    assert_eq!(harness.wait_terminal(&first).await.status, JobStatus::Completed);
    assert_eq!(harness.wait_terminal(&second).await.status, JobStatus::Completed);

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("worker loop stops after shutdown")
        .unwrap();
}

#[tokio::test]
async fn shutdown_interrupts_blocking_dequeue() {
    let harness = Harness::with_config(|config| config.dequeue_timeout = Duration::from_secs(60));
    let controller = harness.controller();
    let shutdown = CancellationToken::new();

    let stopper = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        stopper.cancel();
    });

    tokio::time::timeout(Duration::from_secs(1), controller.run(shutdown))
        .await
        .expect("blocking wait is cancellable");
}

/// Queue that is unreachable for its first few pops
struct FlakyQueue {
    inner: InMemoryJobQueue,
    failures_left: AtomicU32,
    failed_pops: AtomicU32,
}

#[async_trait]
impl JobQueue for FlakyQueue {
    async fn enqueue(&self, id: Uuid) -> Result<(), QueueError> {
        self.inner.enqueue(id).await
    }

    async fn dequeue_blocking(&self, timeout: Duration) -> Result<Option<Uuid>, QueueError> {
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            self.failed_pops.fetch_add(1, Ordering::SeqCst);
            return Err(QueueError::Unavailable("connection refused".to_string()));
        }
        self.inner.dequeue_blocking(timeout).await
    }
}

#[tokio::test]
async fn queue_outage_is_retried_after_backoff() {
    let harness = Harness::new();
    let flaky = Arc::new(FlakyQueue {
        inner: InMemoryJobQueue::new(),
        failures_left: AtomicU32::new(3),
        failed_pops: AtomicU32::new(0),
    });

    let job = harness.submit("a.png", "a_dark.png").await;
    // Route the delivery through the flaky queue instead
    harness.queue.dequeue_blocking(Duration::from_millis(10)).await.unwrap();
    flaky.enqueue(job.id).await.unwrap();

    let controller = Arc::new(harness.controller_with_queue(flaky.clone()));
    let shutdown = CancellationToken::new();
    let handle = {
        let controller = Arc::clone(&controller);
        let shutdown = shutdown.clone();
        tokio::spawn(async move { controller.run(shutdown).await })
    };

    assert_eq!(harness.wait_terminal(&job).await.status, JobStatus::Completed);
    assert_eq!(flaky.failed_pops.load(Ordering::SeqCst), 3);

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn gallery_lists_only_completed_jobs_newest_first() {
    let harness = Harness::new();
    let controller = harness.controller();

    let older = harness.submit("a.png", "a_dark.png").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    let newer = harness.submit("b.png", "b_dark.png").await;
    let pending = harness.submit("c.png", "c_dark.png").await;

    controller.process_job(older.id).await;
    controller.process_job(newer.id).await;

    harness.tools.fail("heif-enc");
    let failed = harness.submit("d.png", "d_dark.png").await;
    controller.process_job(failed.id).await;

    let gallery = harness
        .store
        .list_by_status(JobStatus::Completed)
        .await
        .unwrap();
    let ids: Vec<Uuid> = gallery.iter().map(|j| j.id).collect();
    assert_eq!(ids, vec![newer.id, older.id]);
    assert!(!ids.contains(&pending.id));
    assert!(!ids.contains(&failed.id));
    assert!(gallery.iter().all(|j| j.final_url.is_some()));
}
