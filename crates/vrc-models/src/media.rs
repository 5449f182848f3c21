//! Source media metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Marker used for a missing audio stream.
pub const NO_AUDIO: &str = "none";
/// Marker used for a codec that could not be identified.
pub const UNKNOWN_CODEC: &str = "unknown";

/// Container-level facts about a media file.
///
/// `width` and `height` are display dimensions: a stream tagged with a
/// ±90° rotation reports its coded dimensions swapped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    /// Container format derived from the file extension (mp4, mov, ...)
    pub container: String,
    /// Normalised video codec name (h264, hevc, vp9, ...)
    pub video_codec: String,
    /// Normalised audio codec name, or `"none"`
    pub audio_codec: String,
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Rotation in degrees as tagged on the video stream
    #[serde(default)]
    pub rotation: i32,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Video bitrate in bits/second (0 when unknown)
    pub video_bitrate: u64,
    /// Audio bitrate in bits/second (0 when there is no audio)
    pub audio_bitrate: u64,
    /// Frame rate (fps)
    pub frame_rate: f64,
    /// File size in bytes
    pub size_bytes: u64,
}

impl MediaInfo {
    pub fn has_audio(&self) -> bool {
        self.audio_codec != NO_AUDIO
    }

    pub fn source_info(&self) -> SourceInfo {
        SourceInfo::from(self)
    }
}

/// The subset of [`MediaInfo`] the decision engine works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Display width in pixels
    pub width: u32,
    /// Display height in pixels
    pub height: u32,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// File size in bytes
    pub size_bytes: u64,
}

impl SourceInfo {
    pub fn new(width: u32, height: u32, duration_ms: u64, size_bytes: u64) -> Self {
        Self {
            width,
            height,
            duration_ms,
            size_bytes,
        }
    }

    /// Returns a copy with a different size, keeping everything else.
    pub fn with_size(self, size_bytes: u64) -> Self {
        Self { size_bytes, ..self }
    }

    /// Check if both dimensions fit inside the given bounds.
    pub fn fits_within(&self, max_width: u32, max_height: u32) -> bool {
        self.width <= max_width && self.height <= max_height
    }
}

impl From<&MediaInfo> for SourceInfo {
    fn from(info: &MediaInfo) -> Self {
        Self {
            width: info.width,
            height: info.height,
            duration_ms: info.duration_ms,
            size_bytes: info.size_bytes,
        }
    }
}
