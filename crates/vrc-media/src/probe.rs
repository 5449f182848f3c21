//! FFprobe video information.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use vrc_models::{MediaInfo, NO_AUDIO, UNKNOWN_CODEC};

use crate::command::{file_url, DEFAULT_FFPROBE_BIN};
use crate::error::{MediaError, MediaResult};

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    bit_rate: Option<String>,
    duration: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Deserialize)]
struct FfprobeSideData {
    rotation: Option<f64>,
}

impl FfprobeStream {
    fn is(&self, codec_type: &str) -> bool {
        self.codec_type.as_deref() == Some(codec_type)
    }

    fn rotation(&self) -> i32 {
        let from_side_data = self
            .side_data_list
            .iter()
            .find_map(|sd| sd.rotation)
            .map(|r| r.round() as i32);
        let from_tags = self.tags.get("rotate").and_then(|r| r.trim().parse::<i32>().ok());
        from_side_data.or(from_tags).unwrap_or(0)
    }
}

/// Inspects container metadata with `ffprobe`.
#[derive(Debug, Clone)]
pub struct Prober {
    binary: String,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    pub fn new() -> Self {
        Self {
            binary: DEFAULT_FFPROBE_BIN.to_string(),
        }
    }

    /// Use a specific FFprobe binary.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Probe a video file for information.
    ///
    /// Only container and stream headers are read. The ffprobe child is
    /// always awaited, and killed if this future is dropped early.
    pub async fn probe(&self, path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
        let path = path.as_ref();

        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(MediaError::FileNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(MediaError::Io(e)),
        };
        if !metadata.is_file() {
            return Err(MediaError::invalid_video(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let binary = which::which(&self.binary)
            .map_err(|_| MediaError::FfprobeNotFound(self.binary.clone()))?;

        let output = Command::new(binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg("-i")
            .arg(file_url(path))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(MediaError::ffprobe_failed(
                format!("FFprobe could not read {}", path.display()),
                Some(String::from_utf8_lossy(&output.stderr).to_string()),
            ));
        }

        let info = parse_probe_output(&output.stdout, path, metadata.len())?;
        debug!(
            path = %path.display(),
            width = info.width,
            height = info.height,
            duration_ms = info.duration_ms,
            video_codec = %info.video_codec,
            "Probed media"
        );
        Ok(info)
    }
}

/// Probe a video file with the default `ffprobe` binary.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    Prober::new().probe(path).await
}

/// Turn raw ffprobe JSON into [`MediaInfo`].
pub(crate) fn parse_probe_output(
    stdout: &[u8],
    path: &Path,
    size_bytes: u64,
) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.is("video"))
        .ok_or_else(|| MediaError::invalid_video("No video stream found"))?;
    let audio_stream = probe.streams.iter().find(|s| s.is("audio"));

    let (coded_width, coded_height) = match (video_stream.width, video_stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(MediaError::invalid_video(
                "Video stream has no usable dimensions",
            ))
        }
    };

    let rotation = video_stream.rotation();
    let (width, height) = if rotation.rem_euclid(180) == 90 {
        (coded_height, coded_width)
    } else {
        (coded_width, coded_height)
    };

    let format = probe.format.as_ref();
    let duration_secs = format
        .and_then(|f| parse_number(f.duration.as_deref()))
        .or_else(|| parse_number(video_stream.duration.as_deref()))
        .unwrap_or(0.0);
    let duration_ms = (duration_secs.max(0.0) * 1000.0).round() as u64;

    let video_codec = normalize_video_codec(video_stream.codec_name.as_deref());
    let audio_codec = audio_stream
        .map(|s| normalize_audio_codec(s.codec_name.as_deref()))
        .unwrap_or_else(|| NO_AUDIO.to_string());

    let audio_bitrate = match audio_stream {
        Some(stream) => parse_number(stream.bit_rate.as_deref())
            .map(|b| b as u64)
            .unwrap_or_else(|| typical_audio_bitrate(&audio_codec)),
        None => 0,
    };

    // Fall back to the container bitrate minus audio when the stream has none
    let video_bitrate = parse_number(video_stream.bit_rate.as_deref())
        .map(|b| b as u64)
        .or_else(|| {
            format
                .and_then(|f| parse_number(f.bit_rate.as_deref()))
                .map(|total| (total as u64).saturating_sub(audio_bitrate))
        })
        .unwrap_or(0);

    let frame_rate = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(MediaInfo {
        container: container_of(path),
        video_codec,
        audio_codec,
        width,
        height,
        rotation,
        duration_ms,
        video_bitrate,
        audio_bitrate,
        frame_rate,
        size_bytes,
    })
}

fn parse_number(s: Option<&str>) -> Option<f64> {
    s.and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v >= 0.0)
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}

/// Container name from the file extension.
fn container_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| UNKNOWN_CODEC.to_string())
}

fn normalize_video_codec(name: Option<&str>) -> String {
    let name = name.unwrap_or_default().to_ascii_lowercase();
    let normalized = if name.contains("h264") || name.contains("avc") {
        "h264"
    } else if name.contains("hevc") || name.contains("h265") {
        "hevc"
    } else if name.contains("vp8") {
        "vp8"
    } else if name.contains("vp9") {
        "vp9"
    } else if name.contains("av1") || name.contains("av01") {
        "av1"
    } else if name.is_empty() {
        UNKNOWN_CODEC
    } else {
        return name;
    };
    normalized.to_string()
}

fn normalize_audio_codec(name: Option<&str>) -> String {
    let name = name.unwrap_or_default().to_ascii_lowercase();
    let normalized = if name.contains("aac") || name.contains("mp4a") {
        "aac"
    } else if name.contains("mp3") {
        "mp3"
    } else if name.contains("opus") {
        "opus"
    } else if name.contains("vorbis") {
        "vorbis"
    } else if name.contains("flac") {
        "flac"
    } else if name.is_empty() {
        UNKNOWN_CODEC
    } else {
        return name;
    };
    normalized.to_string()
}

/// Bitrate assumed when an audio stream does not declare one.
fn typical_audio_bitrate(codec: &str) -> u64 {
    match codec {
        "opus" => 96_000,
        _ => 128_000,
    }
}
