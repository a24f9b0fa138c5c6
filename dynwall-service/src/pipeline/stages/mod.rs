//! Concrete processing stages

mod encode;
mod metadata;
mod preview;

pub use encode::{EncodeStage, OUTPUT_FILE as ENCODED_FILE};
pub use metadata::{MetadataStage, XMP_PACKET};
pub use preview::{OUTPUT_FILE as PREVIEW_FILE, PreviewStage};
