//! Metadata stage
//!
//! Writes an XMP sidecar carrying the dynamic-desktop appearance descriptor
//! next to the light image, then has exiv2 embed it into the image in place.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::pipeline::{Artifact, Stage, StageError, ToolRunner, Workspace, run_tool};

/// Appearance descriptor: image 0 is the light variant, image 1 the dark one.
pub const XMP_PACKET: &str = r#"<?xpacket?><x:xmpmeta xmlns:x="adobe:ns:meta"><rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns"><rdf:Description xmlns:apple_desktop="http://ns.apple.com/namespace/1.0" apple_desktop:apr="YnBsaXN0MDDSAQMCBFFsEAFRZBAACA0TEQ/REMOVE/8BAQAAAAAAAAAFAAAAAAAAAAAAAAAAAAAAFQ=="/></rdf:RDF></x:xmpmeta>"#;

pub struct MetadataStage {
    exiv2_bin: String,
}

impl MetadataStage {
    pub fn new(exiv2_bin: impl Into<String>) -> Self {
        Self {
            exiv2_bin: exiv2_bin.into(),
        }
    }
}

/// `<dir>/<light stem>.xmp`, the sidecar name exiv2 looks for with `-iX`
pub fn sidecar_path(workspace: &Workspace) -> PathBuf {
    let stem = workspace
        .light
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "light".to_string());
    workspace.dir.join(format!("{}.xmp", stem))
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl Stage for MetadataStage {
    fn name(&self) -> &'static str {
        "metadata"
    }

    async fn run(
        &self,
        workspace: &Workspace,
        tools: &dyn ToolRunner,
    ) -> Result<Option<Artifact>, StageError> {
        tokio::fs::write(sidecar_path(workspace), XMP_PACKET).await?;

        let args = vec![
            "-iX".to_string(),
            "in".to_string(),
            path_arg(&workspace.light),
        ];
        run_tool(tools, &self.exiv2_bin, &args, &workspace.dir).await?;

        Ok(None)
    }
}
