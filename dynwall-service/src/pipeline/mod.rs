//! Stage executor
//!
//! Runs the ordered processing stages against one job's working directory:
//! metadata embedding, dual-image encode and (optionally) preview. The
//! pipeline stops at the first failing stage and reports which one failed;
//! it never retries.

pub mod stages;
pub mod tool;

use async_trait::async_trait;
use dynwall_core::domain::job::Job;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::ToolsConfig;
pub use tool::{ProcessToolRunner, ToolOutput, ToolRunner};

/// A job's working directory and its declared inputs
#[derive(Debug, Clone)]
pub struct Workspace {
    pub job_id: Uuid,
    pub dir: PathBuf,
    pub light: PathBuf,
    pub dark: PathBuf,
}

impl Workspace {
    pub fn for_job(job: &Job) -> Self {
        Self {
            job_id: job.id,
            dir: job.working_dir().to_path_buf(),
            light: job.light_input_path.clone(),
            dark: job.dark_input_path.clone(),
        }
    }
}

/// Kinds of files meant for durable storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// The combined dynamic wallpaper
    Wallpaper,
    /// Downscaled preview of the light image
    Preview,
}

/// A file produced by a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

/// Why a stage failed
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error("failed to start {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with code {exit_code}: {output}")]
    ToolFailed {
        tool: String,
        exit_code: i32,
        output: String,
    },

    #[error("expected output {} was not produced", .0.display())]
    MissingOutput(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The first failure of a pipeline run
#[derive(Debug, thiserror::Error)]
#[error("stage '{stage}' failed: {error}")]
pub struct StageFailure {
    pub stage: &'static str,
    #[source]
    pub error: StageError,
}

/// One processing step. Given identical inputs it produces identical outputs.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Runs the stage, returning the artifact it produced if any
    async fn run(
        &self,
        workspace: &Workspace,
        tools: &dyn ToolRunner,
    ) -> Result<Option<Artifact>, StageError>;
}

/// Ordered list of stages sharing one tool runner
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    tools: Arc<dyn ToolRunner>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>, tools: Arc<dyn ToolRunner>) -> Self {
        Self { stages, tools }
    }

    /// Metadata, encode, then preview when enabled
    pub fn standard(config: &ToolsConfig, preview_enabled: bool, tools: Arc<dyn ToolRunner>) -> Self {
        let mut steps: Vec<Box<dyn Stage>> = vec![
            Box::new(stages::MetadataStage::new(config.exiv2_bin.clone())),
            Box::new(stages::EncodeStage::new(config.heif_enc_bin.clone())),
        ];
        if preview_enabled {
            steps.push(Box::new(stages::PreviewStage::new(
                config.magick_bin.clone(),
                config.preview_size.clone(),
            )));
        }
        Self::new(steps, tools)
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Runs every stage in order, stopping at the first failure
    pub async fn run(&self, workspace: &Workspace) -> Result<Vec<Artifact>, StageFailure> {
        let mut artifacts = Vec::new();

        for (idx, stage) in self.stages.iter().enumerate() {
            info!(
                "Job {}: executing stage {}/{}: {}",
                workspace.job_id,
                idx + 1,
                self.stages.len(),
                stage.name()
            );

            match stage.run(workspace, self.tools.as_ref()).await {
                Ok(Some(artifact)) => {
                    debug!(
                        "Stage '{}' produced {}",
                        stage.name(),
                        artifact.path.display()
                    );
                    artifacts.push(artifact);
                }
                Ok(None) => debug!("Stage '{}' completed", stage.name()),
                Err(error) => {
                    error!(
                        "Job {}: stage '{}' failed: {}",
                        workspace.job_id,
                        stage.name(),
                        error
                    );
                    return Err(StageFailure {
                        stage: stage.name(),
                        error,
                    });
                }
            }
        }

        Ok(artifacts)
    }
}

/// Runs one tool and turns a non-zero exit into `StageError::ToolFailed`
pub(crate) async fn run_tool(
    tools: &dyn ToolRunner,
    program: &str,
    args: &[String],
    cwd: &Path,
) -> Result<(), StageError> {
    let result = tools
        .run(program, args, cwd)
        .await
        .map_err(|source| StageError::Launch {
            tool: program.to_string(),
            source,
        })?;

    if !result.success {
        return Err(StageError::ToolFailed {
            tool: program.to_string(),
            exit_code: result.exit_code,
            output: result.output,
        });
    }

    if !result.output.is_empty() {
        debug!("{} output: {}", program, result.output);
    }
    Ok(())
}

/// Confirms a tool actually wrote the file it was asked to
pub(crate) async fn ensure_output(path: &Path) -> Result<(), StageError> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(StageError::MissingOutput(path.to_path_buf())),
    }
}
