//! External tool execution
//!
//! Stages never spawn processes directly; they go through a `ToolRunner` so
//! the pipeline can be exercised with scripted tools.

use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;
use tracing::debug;

/// Captured result of one tool invocation
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub success: bool,
    /// Exit code, or -1 when the process was killed by a signal
    pub exit_code: i32,
    /// stdout followed by stderr
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            exit_code: 0,
            output: output.into(),
        }
    }

    pub fn failure(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code,
            output: output.into(),
        }
    }
}

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Runs `program` with `args` in `cwd` and waits for it to exit.
    ///
    /// An `Err` means the program could not be started at all.
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> std::io::Result<ToolOutput>;
}

/// Runs tools as child processes
#[derive(Debug, Default, Clone)]
pub struct ProcessToolRunner;

impl ProcessToolRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ToolRunner for ProcessToolRunner {
    async fn run(&self, program: &str, args: &[String], cwd: &Path) -> std::io::Result<ToolOutput> {
        debug!("Executing {} {:?} in {}", program, args, cwd.display());

        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output()
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let mut combined = stdout.trim_end().to_string();
        if !stderr.trim().is_empty() {
            if !combined.is_empty() {
                combined.push('\n');
            }
            combined.push_str(stderr.trim_end());
        }

        let exit_code = output.status.code().unwrap_or(-1);
        debug!(
            "{} exited with code {} (output_len={})",
            program,
            exit_code,
            combined.len()
        );

        Ok(ToolOutput {
            success: output.status.success(),
            exit_code,
            output: combined,
        })
    }
}
