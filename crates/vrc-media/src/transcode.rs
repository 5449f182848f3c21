//! Recompression command construction.

use std::path::PathBuf;

use vrc_models::{Settings, OUTPUT_CONTAINER};

use crate::command::FfmpegCommand;

/// Default x264/x265 speed preset.
pub const DEFAULT_PRESET: &str = "fast";

/// One recompression of `input` into `output` at `width`x`height`.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    pub input: PathBuf,
    /// Where FFmpeg writes; normally a staging file
    pub output: PathBuf,
    pub settings: Settings,
    /// Target display width (even)
    pub width: u32,
    /// Target display height (even)
    pub height: u32,
    /// Source duration, used to turn FFmpeg timestamps into a fraction
    pub duration_ms: u64,
}

/// Build the FFmpeg invocation for a [`TranscodeJob`].
///
/// FFmpeg applies the source rotation before the scale filter, so the target
/// dimensions are display dimensions. Only the first video stream and the
/// first audio stream (if any) are kept.
pub fn build_transcode_command(job: &TranscodeJob, preset: &str, log_level: &str) -> FfmpegCommand {
    let settings = &job.settings;

    let mut cmd = FfmpegCommand::new(&job.input, &job.output)
        .log_level(log_level)
        .map("0:v:0")
        .map("0:a:0?")
        .video_filter(format!("scale={}:{}", job.width, job.height))
        .video_codec(settings.video_codec.encoder())
        .preset(preset)
        .video_bitrate(settings.effective_video_bitrate())
        .max_video_bitrate(settings.video_bitrate)
        .pixel_format("yuv420p");

    if let Some(tag) = settings.video_codec.mp4_tag() {
        cmd = cmd.video_tag(tag);
    }

    cmd = cmd
        .audio_codec(settings.audio_codec.encoder())
        .audio_bitrate(settings.audio_bitrate);

    if settings.optimize_for_network {
        cmd = cmd.faststart();
    }

    cmd.format(OUTPUT_CONTAINER)
}
