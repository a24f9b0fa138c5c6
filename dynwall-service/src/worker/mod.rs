//! Worker mode
//!
//! Wires the production stage tools, object store and publisher around the
//! lifecycle controller and runs it until shutdown.

mod controller;

pub use controller::{JobOutcome, LifecycleController, WorkerSettings};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ToolsConfig;
use crate::context::AppContext;
use crate::pipeline::{Pipeline, ProcessToolRunner, ToolRunner};
use crate::storage::{ArtifactPublisher, ObjectStore, S3ObjectStore};

/// Runs the lifecycle loop with production collaborators
pub async fn run_worker(ctx: AppContext, shutdown: CancellationToken) -> anyhow::Result<()> {
    let config = &ctx.config;

    let tools: Arc<dyn ToolRunner> = Arc::new(ProcessToolRunner::new());
    check_tools_available(tools.as_ref(), &config.tools, config.preview_enabled).await;

    let pipeline = Pipeline::standard(&config.tools, config.preview_enabled, tools);

    let object_store: Arc<dyn ObjectStore> = Arc::new(S3ObjectStore::from_config(&config.storage));
    let publisher = ArtifactPublisher::from_config(object_store, &config.storage);

    let controller = LifecycleController::new(
        Arc::clone(&ctx.store),
        Arc::clone(&ctx.queue),
        pipeline,
        publisher,
        WorkerSettings::from_config(config),
    );

    info!("Worker initialized successfully");
    controller.run(shutdown).await;
    Ok(())
}

/// Logs the version of every stage tool, warning about the ones that are
/// missing. Jobs needing a missing tool fail at that stage.
async fn check_tools_available(tools: &dyn ToolRunner, config: &ToolsConfig, preview_enabled: bool) {
    let mut binaries = vec![&config.exiv2_bin, &config.heif_enc_bin];
    if preview_enabled {
        binaries.push(&config.magick_bin);
    }

    let cwd = std::env::temp_dir();
    for bin in binaries {
        match tools.run(bin, &["--version".to_string()], &cwd).await {
            Ok(output) if output.success => {
                let version = output.output.lines().next().unwrap_or_default();
                info!("{} is available: {}", bin, version.trim());
            }
            Ok(output) => warn!(
                "{} --version exited with code {}: {}",
                bin, output.exit_code, output.output
            ),
            Err(e) => warn!("{} is not available: {}", bin, e),
        }
    }
}
