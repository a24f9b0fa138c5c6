#![allow(dead_code)]

use async_trait::async_trait;
use dynwall_core::domain::job::{Job, JobStatus};
use dynwall_service::config::Config;
use dynwall_service::context::AppContext;
use dynwall_service::pipeline::{Pipeline, ToolOutput, ToolRunner};
use dynwall_service::queue::InMemoryJobQueue;
use dynwall_service::repository::{InMemoryJobStore, JobStore};
use dynwall_service::service::wallpaper_service::{self, UploadedImage};
use dynwall_service::storage::{ArtifactPublisher, ObjectStore, UploadError};
use dynwall_service::worker::{LifecycleController, WorkerSettings};
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const PUBLIC_URL: &str = "https://wallpapers.example.com";

/// Tool runner that succeeds by writing the declared output file, unless the
/// program was told to fail
#[derive(Default)]
pub struct ScriptedTools {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl ScriptedTools {
    pub fn fail(&self, program: &str) {
        self.failing.lock().unwrap().insert(program.to_string());
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(program, _)| program.clone())
            .collect()
    }

    pub fn args_of(&self, program: &str) -> Option<Vec<String>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| p == program)
            .map(|(_, args)| args.clone())
    }
}

#[async_trait]
impl ToolRunner for ScriptedTools {
    async fn run(&self, program: &str, args: &[String], _cwd: &Path) -> std::io::Result<ToolOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));

        if self.failing.lock().unwrap().contains(program) {
            return Ok(ToolOutput::failure(
                1,
                format!("{}: simulated failure", program),
            ));
        }

        let output = match program {
            "heif-enc" => args
                .iter()
                .position(|a| a == "-o")
                .and_then(|i| args.get(i + 1)),
            "magick" => args.last(),
            _ => None,
        };
        if let Some(path) = output {
            std::fs::write(path, format!("{} output", program))?;
        }

        Ok(ToolOutput::success(""))
    }
}

/// Object store that records keys instead of uploading
#[derive(Default)]
pub struct RecordingObjectStore {
    keys: Mutex<Vec<String>>,
    failing_prefixes: Mutex<Vec<String>>,
}

impl RecordingObjectStore {
    pub fn fail_prefix(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .unwrap()
            .push(prefix.to_string());
    }

    pub fn keys(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for RecordingObjectStore {
    async fn put_object(
        &self,
        _bucket: &str,
        key: &str,
        path: &Path,
        _content_type: &str,
    ) -> Result<(), UploadError> {
        let failing = self.failing_prefixes.lock().unwrap();
        if failing.iter().any(|prefix| key.starts_with(prefix.as_str())) {
            return Err(UploadError("simulated upload failure".to_string()));
        }
        drop(failing);

        if !path.is_file() {
            return Err(UploadError(format!("{} does not exist", path.display())));
        }

        self.keys.lock().unwrap().push(key.to_string());
        Ok(())
    }
}

/// In-memory wiring of the whole submission + lifecycle path
pub struct Harness {
    pub ctx: AppContext,
    pub store: Arc<InMemoryJobStore>,
    pub queue: Arc<InMemoryJobQueue>,
    pub tools: Arc<ScriptedTools>,
    pub objects: Arc<RecordingObjectStore>,
    pub work_root: TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut Config)) -> Self {
        let work_root = tempfile::tempdir().unwrap();

        let mut config = Config {
            work_root: work_root.path().to_path_buf(),
            dequeue_timeout: Duration::from_millis(50),
            queue_retry_delay: Duration::from_millis(5),
            ..Config::default()
        };
        config.storage.bucket = Some("wallpapers".to_string());
        config.storage.public_url = Some(PUBLIC_URL.to_string());
        customize(&mut config);

        let store = Arc::new(InMemoryJobStore::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let ctx = AppContext::new(config, store.clone(), queue.clone());

        Self {
            ctx,
            store,
            queue,
            tools: Arc::new(ScriptedTools::default()),
            objects: Arc::new(RecordingObjectStore::default()),
            work_root,
        }
    }

    pub fn controller(&self) -> LifecycleController {
        self.controller_with_queue(self.ctx.queue.clone())
    }

    pub fn controller_with_queue(
        &self,
        queue: Arc<dyn dynwall_service::queue::JobQueue>,
    ) -> LifecycleController {
        let config = &self.ctx.config;
        let pipeline = Pipeline::standard(&config.tools, config.preview_enabled, self.tools.clone());
        let publisher = ArtifactPublisher::from_config(self.objects.clone(), &config.storage);

        LifecycleController::new(
            self.ctx.store.clone(),
            queue,
            pipeline,
            publisher,
            WorkerSettings::from_config(config),
        )
    }

    /// Submits `light`/`dark` the way the HTTP handler does
    pub async fn submit(&self, light: &str, dark: &str) -> Job {
        wallpaper_service::submit_wallpaper(&self.ctx, Some(image(light)), Some(image(dark)))
            .await
            .unwrap()
    }

    pub async fn job(&self, job: &Job) -> Job {
        self.store.get(job.id).await.unwrap()
    }

    /// Polls until the job reaches a terminal status or the deadline passes
    pub async fn wait_terminal(&self, job: &Job) -> Job {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let current = self.job(job).await;
            if current.status.is_terminal() || tokio::time::Instant::now() > deadline {
                return current;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub fn image(name: &str) -> UploadedImage {
    UploadedImage {
        file_name: Some(name.to_string()),
        data: b"fake image bytes".to_vec(),
    }
}

pub fn assert_forward_only(history: &[JobStatus]) {
    for pair in history.windows(2) {
        assert!(
            pair[0].can_transition_to(pair[1]),
            "illegal transition {} -> {} in {:?}",
            pair[0],
            pair[1],
            history
        );
    }
}
