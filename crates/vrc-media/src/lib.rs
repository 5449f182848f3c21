//! FFmpeg CLI wrapper for video recompression.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Header-only probing via `ffprobe`
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation support via tokio
//! - Staged, atomically committed output files

pub mod backend;
pub mod cancel;
pub mod command;
pub mod error;
pub mod fs_utils;
pub mod probe;
pub mod progress;
pub mod transcode;

pub use backend::{FfmpegBackend, MediaBackend};
pub use cancel::{CancelHandle, CancelSignal};
pub use command::{check_ffmpeg, check_ffprobe, file_url, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{copy_atomic, StagedOutput};
pub use probe::{probe_video, Prober};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use transcode::{build_transcode_command, TranscodeJob, DEFAULT_PRESET};
