//! Preview stage: a downscaled JPEG of the light image for the gallery.

use async_trait::async_trait;

use crate::pipeline::{
    Artifact, ArtifactKind, Stage, StageError, ToolRunner, Workspace, ensure_output, run_tool,
};

pub const OUTPUT_FILE: &str = "preview.jpg";

pub struct PreviewStage {
    magick_bin: String,
    size: String,
}

impl PreviewStage {
    pub fn new(magick_bin: impl Into<String>, size: impl Into<String>) -> Self {
        Self {
            magick_bin: magick_bin.into(),
            size: size.into(),
        }
    }
}

#[async_trait]
impl Stage for PreviewStage {
    fn name(&self) -> &'static str {
        "preview"
    }

    async fn run(
        &self,
        workspace: &Workspace,
        tools: &dyn ToolRunner,
    ) -> Result<Option<Artifact>, StageError> {
        let output = workspace.dir.join(OUTPUT_FILE);
        let args = vec![
            workspace.light.to_string_lossy().into_owned(),
            "-resize".to_string(),
            self.size.clone(),
            "-quality".to_string(),
            "85".to_string(),
            output.to_string_lossy().into_owned(),
        ];

        run_tool(tools, &self.magick_bin, &args, &workspace.dir).await?;
        ensure_output(&output).await?;

        Ok(Some(Artifact {
            kind: ArtifactKind::Preview,
            path: output,
        }))
    }
}
