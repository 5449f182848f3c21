//! Engine capability description.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{AudioCodec, VideoCodec};

/// Output container produced by recompression.
pub const OUTPUT_CONTAINER: &str = "mp4";

/// What this build of the engine can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub engine: String,
    pub version: String,
    pub features: Vec<String>,
    pub video_codecs: Vec<String>,
    pub audio_codecs: Vec<String>,
    pub output_containers: Vec<String>,
}

impl Capabilities {
    pub fn new(engine: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            version: version.into(),
            features: ["video_analysis", "smart_compression", "codec_detection", "cancellation"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            video_codecs: VideoCodec::ALL.iter().map(|c| c.to_string()).collect(),
            audio_codecs: AudioCodec::ALL.iter().map(|c| c.to_string()).collect(),
            output_containers: vec![OUTPUT_CONTAINER.to_string()],
        }
    }
}
