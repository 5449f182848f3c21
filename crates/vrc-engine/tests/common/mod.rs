//! In-process media backend for engine tests.
//!
//! Fake videos are plain files whose first line is
//! `FAKEVIDEO <width>x<height> <duration_ms>`, padded to the requested size.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use vrc_engine::{CancelSignal, MediaInfo, ProgressCallback};
use vrc_media::{MediaBackend, MediaError, MediaResult, TranscodeJob};

const MAGIC: &str = "FAKEVIDEO";

/// How the fake transcoder misbehaves, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscodeMode {
    /// Write a small file at the requested dimensions
    Normal,
    /// Exit with an FFmpeg-style failure after writing garbage
    Fail,
    /// Ignore the requested dimensions and keep the source's
    IgnoreScale,
}

pub struct FakeBackend {
    mode: TranscodeMode,
    delay: Duration,
    transcodes: AtomicUsize,
    max_parallel: AtomicUsize,
    running: AtomicUsize,
    seen_jobs: Mutex<Vec<TranscodeJob>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            mode: TranscodeMode::Normal,
            delay: Duration::ZERO,
            transcodes: AtomicUsize::new(0),
            max_parallel: AtomicUsize::new(0),
            running: AtomicUsize::new(0),
            seen_jobs: Mutex::new(Vec::new()),
        }
    }

    pub fn with_mode(mut self, mode: TranscodeMode) -> Self {
        self.mode = mode;
        self
    }

    /// Make every transcode take `delay` (cancellable).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn transcode_count(&self) -> usize {
        self.transcodes.load(Ordering::SeqCst)
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel.load(Ordering::SeqCst)
    }

    pub fn last_job(&self) -> Option<TranscodeJob> {
        self.seen_jobs.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl MediaBackend for FakeBackend {
    fn name(&self) -> &str {
        "fake"
    }

    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(MediaError::Io(e)),
        };

        let header = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
        let header = String::from_utf8_lossy(header);
        let mut parts = header.split_whitespace();
        if parts.next() != Some(MAGIC) {
            return Err(MediaError::invalid_video("not a fake video"));
        }
        let (width, height) = parts
            .next()
            .and_then(|dims| dims.split_once('x'))
            .and_then(|(w, h)| Some((w.parse::<u32>().ok()?, h.parse::<u32>().ok()?)))
            .ok_or_else(|| MediaError::invalid_video("bad dimensions"))?;
        let duration_ms = parts.next().and_then(|d| d.parse().ok()).unwrap_or(0);

        Ok(MediaInfo {
            container: "mp4".to_string(),
            video_codec: "h264".to_string(),
            audio_codec: "aac".to_string(),
            width,
            height,
            rotation: 0,
            duration_ms,
            video_bitrate: 0,
            audio_bitrate: 128_000,
            frame_rate: 30.0,
            size_bytes: bytes.len() as u64,
        })
    }

    async fn transcode(
        &self,
        job: &TranscodeJob,
        cancel: Option<CancelSignal>,
        progress: Option<ProgressCallback>,
    ) -> MediaResult<()> {
        self.transcodes.fetch_add(1, Ordering::SeqCst);
        self.seen_jobs.lock().unwrap().push(job.clone());
        let running = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_parallel.fetch_max(running, Ordering::SeqCst);

        let result = self.do_transcode(job, cancel, progress).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl FakeBackend {
    async fn do_transcode(
        &self,
        job: &TranscodeJob,
        cancel: Option<CancelSignal>,
        progress: Option<ProgressCallback>,
    ) -> MediaResult<()> {
        let source = self.probe(&job.input).await?;

        if let Some(cb) = &progress {
            cb(0.5);
        }

        if !self.delay.is_zero() {
            match cancel {
                Some(mut cancel) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.delay) => {}
                        _ = cancel.cancelled() => return Err(MediaError::Cancelled),
                    }
                }
                None => tokio::time::sleep(self.delay).await,
            }
        }

        let (width, height) = match self.mode {
            TranscodeMode::IgnoreScale => (source.width, source.height),
            _ => (job.width, job.height),
        };

        if self.mode == TranscodeMode::Fail {
            tokio::fs::write(&job.output, b"garbage").await?;
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("Conversion failed!".to_string()),
                Some(1),
            ));
        }

        let contents = fake_video_bytes(width, height, job.duration_ms, 4_096);
        tokio::fs::write(&job.output, contents).await?;

        if let Some(cb) = &progress {
            cb(1.0);
        }
        Ok(())
    }
}

pub fn fake_video_bytes(width: u32, height: u32, duration_ms: u64, size: usize) -> Vec<u8> {
    let mut bytes = format!("{} {}x{} {}\n", MAGIC, width, height, duration_ms).into_bytes();
    let mut filler = 0u8;
    while bytes.len() < size {
        bytes.push(filler);
        filler = filler.wrapping_add(31);
    }
    bytes
}

/// Write a fake video of exactly `size` bytes.
pub fn write_fake_video(path: &Path, width: u32, height: u32, size: usize) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, fake_video_bytes(width, height, 10_000, size)).unwrap();
}

/// File names in `dir`, sorted; empty if `dir` does not exist.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let Ok(read) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = read
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}
