//! Media backend abstraction.
//!
//! The engine only talks to media tooling through [`MediaBackend`], so the
//! FFmpeg implementation can be swapped for an in-process fake in tests.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use vrc_models::MediaInfo;

use crate::cancel::CancelSignal;
use crate::command::{
    check_ffmpeg, check_ffprobe, FfmpegRunner, DEFAULT_FFMPEG_BIN, DEFAULT_FFPROBE_BIN,
};
use crate::error::MediaResult;
use crate::probe::Prober;
use crate::progress::ProgressCallback;
use crate::transcode::{build_transcode_command, TranscodeJob, DEFAULT_PRESET};

/// Probing and transcoding primitives used by the engine.
#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Short identifier used in logs and capability reports.
    fn name(&self) -> &str;

    /// Read container and stream metadata without decoding frames.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Recompress `job.input` into `job.output`.
    ///
    /// Must return [`MediaError::Cancelled`](crate::MediaError::Cancelled)
    /// promptly once `cancel` fires.
    async fn transcode(
        &self,
        job: &TranscodeJob,
        cancel: Option<CancelSignal>,
        progress: Option<ProgressCallback>,
    ) -> MediaResult<()>;
}

/// [`MediaBackend`] driving the `ffmpeg` and `ffprobe` CLIs.
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg_bin: String,
    ffprobe_bin: String,
    log_level: String,
    preset: String,
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegBackend {
    pub fn new() -> Self {
        Self {
            ffmpeg_bin: DEFAULT_FFMPEG_BIN.to_string(),
            ffprobe_bin: DEFAULT_FFPROBE_BIN.to_string(),
            log_level: "error".to_string(),
            preset: DEFAULT_PRESET.to_string(),
        }
    }

    pub fn with_binaries(mut self, ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        self.ffmpeg_bin = ffmpeg.into();
        self.ffprobe_bin = ffprobe.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_preset(mut self, preset: impl Into<String>) -> Self {
        self.preset = preset.into();
        self
    }

    pub fn ffmpeg_bin(&self) -> &str {
        &self.ffmpeg_bin
    }

    pub fn ffprobe_bin(&self) -> &str {
        &self.ffprobe_bin
    }

    /// Verify both binaries resolve on PATH.
    pub fn check(&self) -> MediaResult<()> {
        let ffmpeg = check_ffmpeg(&self.ffmpeg_bin)?;
        let ffprobe = check_ffprobe(&self.ffprobe_bin)?;
        debug!(ffmpeg = %ffmpeg.display(), ffprobe = %ffprobe.display(), "Media tools found");
        Ok(())
    }
}

#[async_trait]
impl MediaBackend for FfmpegBackend {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        Prober::new()
            .with_binary(self.ffprobe_bin.clone())
            .probe(path)
            .await
    }

    async fn transcode(
        &self,
        job: &TranscodeJob,
        cancel: Option<CancelSignal>,
        progress: Option<ProgressCallback>,
    ) -> MediaResult<()> {
        let cmd = build_transcode_command(job, &self.preset, &self.log_level);

        let mut runner = FfmpegRunner::new().with_binary(self.ffmpeg_bin.clone());
        if let Some(cancel) = cancel {
            runner = runner.with_cancel(cancel);
        }

        info!(
            input = %job.input.display(),
            width = job.width,
            height = job.height,
            codec = %job.settings.video_codec,
            "Starting transcode"
        );

        let total_ms = i64::try_from(job.duration_ms).unwrap_or(i64::MAX);
        runner
            .run_with_progress(&cmd, move |p| {
                debug!(
                    percent = p.percentage(total_ms),
                    eta_secs = ?p.eta_seconds(total_ms),
                    speed = p.speed,
                    "Transcode progress"
                );
                if let Some(cb) = &progress {
                    cb(p.fraction(total_ms));
                }
            })
            .await
    }
}
