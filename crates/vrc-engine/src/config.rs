//! Engine configuration.

use vrc_media::{FfmpegBackend, DEFAULT_PRESET};

use crate::decision::DEFAULT_SIZE_THRESHOLD_BYTES;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Files above this size are recompressed even when within bounds
    pub size_threshold_bytes: u64,
    /// FFmpeg binary name or path
    pub ffmpeg_bin: String,
    /// FFprobe binary name or path
    pub ffprobe_bin: String,
    /// Maximum concurrent invocations in batch mode
    pub max_concurrent: usize,
    /// FFmpeg `-v` log level
    pub ffmpeg_log_level: String,
    /// Encoder speed preset
    pub preset: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            size_threshold_bytes: DEFAULT_SIZE_THRESHOLD_BYTES,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            max_concurrent: 2,
            ffmpeg_log_level: "error".to_string(),
            preset: DEFAULT_PRESET.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            size_threshold_bytes: lookup("VRC_SIZE_THRESHOLD_BYTES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.size_threshold_bytes),
            ffmpeg_bin: lookup("VRC_FFMPEG_BIN")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: lookup("VRC_FFPROBE_BIN")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.ffprobe_bin),
            max_concurrent: lookup("VRC_MAX_CONCURRENT")
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent),
            ffmpeg_log_level: lookup("VRC_FFMPEG_LOG_LEVEL").unwrap_or(defaults.ffmpeg_log_level),
            preset: lookup("VRC_PRESET").unwrap_or(defaults.preset),
        }
    }

    /// Build the FFmpeg backend described by this config.
    pub fn backend(&self) -> FfmpegBackend {
        FfmpegBackend::new()
            .with_binaries(self.ffmpeg_bin.clone(), self.ffprobe_bin.clone())
            .with_log_level(self.ffmpeg_log_level.clone())
            .with_preset(self.preset.clone())
    }
}
