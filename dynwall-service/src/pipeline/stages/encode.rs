//! Encode stage
//!
//! Combines the light and dark images into one HEIC container.

use async_trait::async_trait;
use std::path::Path;

use crate::pipeline::{
    Artifact, ArtifactKind, Stage, StageError, ToolRunner, Workspace, ensure_output, run_tool,
};

/// File name of the combined output inside the working directory
pub const OUTPUT_FILE: &str = "dynamic.heic";

pub struct EncodeStage {
    heif_enc_bin: String,
}

impl EncodeStage {
    pub fn new(heif_enc_bin: impl Into<String>) -> Self {
        Self {
            heif_enc_bin: heif_enc_bin.into(),
        }
    }

    /// `[-L] <light> <dark> -o <out>`; PNG input is encoded losslessly
    pub fn arguments(workspace: &Workspace, output: &Path) -> Vec<String> {
        let mut args = Vec::with_capacity(5);
        if is_png(&workspace.light) {
            args.push("-L".to_string());
        }
        args.push(workspace.light.to_string_lossy().into_owned());
        args.push(workspace.dark.to_string_lossy().into_owned());
        args.push("-o".to_string());
        args.push(output.to_string_lossy().into_owned());
        args
    }
}

fn is_png(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false)
}

#[async_trait]
impl Stage for EncodeStage {
    fn name(&self) -> &'static str {
        "encode"
    }

    async fn run(
        &self,
        workspace: &Workspace,
        tools: &dyn ToolRunner,
    ) -> Result<Option<Artifact>, StageError> {
        let output = workspace.dir.join(OUTPUT_FILE);
        let args = Self::arguments(workspace, &output);

        run_tool(tools, &self.heif_enc_bin, &args, &workspace.dir).await?;
        ensure_output(&output).await?;

        Ok(Some(Artifact {
            kind: ArtifactKind::Wallpaper,
            path: output,
        }))
    }
}
