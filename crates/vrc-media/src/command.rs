//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::cancel::CancelSignal;
use crate::error::{MediaError, MediaResult};
use crate::progress::{is_progress_line, parse_progress_line, FfmpegProgress};

/// Default FFmpeg binary name.
pub const DEFAULT_FFMPEG_BIN: &str = "ffmpeg";
/// Default FFprobe binary name.
pub const DEFAULT_FFPROBE_BIN: &str = "ffprobe";

/// Number of diagnostic stderr lines kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// Address `path` through FFmpeg's `file:` protocol.
///
/// A bare path starting with `-` reads as an option and one containing `:`
/// reads as a protocol prefix.
pub fn file_url(path: &Path) -> OsString {
    let mut url = OsString::from("file:");
    url.push(path);
    url
}

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file path
    input: PathBuf,
    /// Output file path
    output: PathBuf,
    /// Input arguments (before -i)
    input_args: Vec<String>,
    /// Output arguments (after -i)
    output_args: Vec<String>,
    /// Whether to overwrite output
    overwrite: bool,
    /// Log level
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command.
    pub fn new(input: impl AsRef<Path>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.as_ref().to_path_buf(),
            output: output.as_ref().to_path_buf(),
            input_args: Vec::new(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add input arguments (before -i).
    pub fn input_arg(mut self, arg: impl Into<String>) -> Self {
        self.input_args.push(arg.into());
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Select an input stream for the output (`-map`).
    pub fn map(self, spec: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(spec)
    }

    /// Set video filter.
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set video bitrate in bits/second.
    pub fn video_bitrate(self, bits_per_sec: u32) -> Self {
        self.output_arg("-b:v").output_arg(bits_per_sec.to_string())
    }

    /// Cap the video bitrate with a rate-control buffer.
    pub fn max_video_bitrate(self, bits_per_sec: u32) -> Self {
        let bufsize = u64::from(bits_per_sec) * 2;
        self.output_arg("-maxrate")
            .output_arg(bits_per_sec.to_string())
            .output_arg("-bufsize")
            .output_arg(bufsize.to_string())
    }

    /// Set the video sample entry tag.
    pub fn video_tag(self, tag: impl Into<String>) -> Self {
        self.output_arg("-tag:v").output_arg(tag)
    }

    /// Set the output pixel format.
    pub fn pixel_format(self, pix_fmt: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(pix_fmt)
    }

    /// Set audio codec.
    pub fn audio_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:a").output_arg(codec)
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set audio bitrate in bits/second.
    pub fn audio_bitrate(self, bits_per_sec: u32) -> Self {
        self.output_arg("-b:a").output_arg(bits_per_sec.to_string())
    }

    /// Relocate the MP4 index to the start of the file.
    pub fn faststart(self) -> Self {
        self.output_arg("-movflags").output_arg("+faststart")
    }

    /// Force the output container format.
    pub fn format(self, format: impl Into<String>) -> Self {
        self.output_arg("-f").output_arg(format)
    }

    /// Set log level.
    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-nostdin".to_string());
        args.push("-v".to_string());
        args.push(self.log_level.clone());

        // Progress output to stderr
        args.push("-progress".to_string());
        args.push("pipe:2".to_string());

        args.extend(self.input_args.iter().cloned());

        args.push("-i".to_string());
        args.push(file_url(&self.input).to_string_lossy().into_owned());

        args.extend(self.output_args.iter().cloned());

        args.push(file_url(&self.output).to_string_lossy().into_owned());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and cancellation.
pub struct FfmpegRunner {
    /// FFmpeg binary name or path
    binary: String,
    /// Cancellation signal
    cancel: Option<CancelSignal>,
}

impl Default for FfmpegRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FfmpegRunner {
    /// Create a new runner.
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_FFMPEG_BIN.to_string(),
            cancel: None,
        }
    }

    /// Use a specific FFmpeg binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Set cancellation signal.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run an FFmpeg command.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        self.run_with_progress(cmd, |_| {}).await
    }

    /// Run an FFmpeg command with progress callback.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        let binary = which::which(&self.binary)
            .map_err(|_| MediaError::FfmpegNotFound(self.binary.clone()))?;

        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(MediaError::Cancelled);
        }

        let args = cmd.build_args();
        debug!("Running FFmpeg: {} {}", binary.display(), args.join(" "));

        let mut child = Command::new(&binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stderr was not captured"))?;

        // Progress keys and diagnostics share stderr; keep the tail of the latter
        let progress_handle = tokio::spawn(async move {
            let mut reader = BufReader::new(stderr).lines();
            let mut current_progress = FfmpegProgress::default();
            let mut diagnostics: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = parse_progress_line(&line, &mut current_progress) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if diagnostics.len() == STDERR_TAIL_LINES {
                        diagnostics.pop_front();
                    }
                    diagnostics.push_back(line);
                }
            }

            Vec::from(diagnostics).join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;

        let stderr_tail = progress_handle.await.unwrap_or_default();

        match result {
            Err(MediaError::FfmpegFailed {
                message, exit_code, ..
            }) => Err(MediaError::ffmpeg_failed(
                message,
                (!stderr_tail.is_empty()).then_some(stderr_tail),
                exit_code,
            )),
            other => other,
        }
    }

    /// Wait for child process, killing it if cancellation is requested first.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let status = match &self.cancel {
            Some(cancel) => {
                let mut cancel = cancel.clone();
                let outcome = tokio::select! {
                    status = child.wait() => Some(status),
                    _ = cancel.cancelled() => None,
                };
                match outcome {
                    Some(status) => status?,
                    None => {
                        info!("FFmpeg cancelled, killing process");
                        let _ = child.kill().await;
                        return Err(MediaError::Cancelled);
                    }
                }
            }
            None => child.wait().await?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::FfmpegNotFound(binary.to_string()))
}

/// Check if FFprobe is available.
pub fn check_ffprobe(binary: &str) -> MediaResult<PathBuf> {
    which::which(binary).map_err(|_| MediaError::FfprobeNotFound(binary.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = FfmpegCommand::new("input.mp4", "output.mp4")
            .video_filter("scale=1280:720")
            .video_codec("libx264")
            .video_bitrate(560_000)
            .max_video_bitrate(800_000)
            .format("mp4");

        let args = cmd.build_args();
        assert_eq!(args.first().map(String::as_str), Some("-y"));
        assert!(args.contains(&"-vf".to_string()));
        assert!(args.contains(&"scale=1280:720".to_string()));
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"560000".to_string()));
        assert!(args.contains(&"1600000".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("file:output.mp4"));
    }

    #[test]
    fn test_input_precedes_output_args() {
        let args = FfmpegCommand::new("in.mov", "out.mp4")
            .input_arg("-hide_banner")
            .faststart()
            .build_args();

        let pos = |needle: &str| args.iter().position(|a| a == needle).unwrap();
        assert!(pos("-hide_banner") < pos("-i"));
        assert!(pos("-i") < pos("-movflags"));
        assert_eq!(args[pos("-i") + 1], "file:in.mov");
    }

    #[test]
    fn test_awkward_paths_are_file_urls() {
        let args = FfmpegCommand::new("-dash.mov", "clip:1.mp4").build_args();
        let input = args.iter().position(|a| a == "-i").unwrap() + 1;
        assert_eq!(args[input], "file:-dash.mov");
        assert_eq!(args.last().map(String::as_str), Some("file:clip:1.mp4"));
        assert_eq!(file_url(Path::new("/tmp/a b.mp4")), "file:/tmp/a b.mp4");
    }

    #[test]
    fn test_missing_binary_is_reported() {
        let err = check_ffmpeg("definitely-not-a-real-ffmpeg-binary").unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(name) if name.contains("definitely")));
    }

    #[tokio::test]
    async fn test_runner_reports_missing_binary() {
        let runner = FfmpegRunner::new().with_binary("definitely-not-a-real-ffmpeg-binary");
        let cmd = FfmpegCommand::new("in.mp4", "out.mp4");
        let err = runner.run(&cmd).await.unwrap_err();
        assert!(matches!(err, MediaError::FfmpegNotFound(_)));
    }
}
