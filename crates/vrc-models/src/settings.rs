//! Recompression settings.
//!
//! Settings arrive from callers as an untyped key/value map (the shape a
//! JSON object or bridge map takes). They are validated exactly once, at the
//! boundary, into an immutable [`Settings`] value; nothing downstream probes
//! types at runtime.

use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default audio bitrate (bits/second)
pub const DEFAULT_AUDIO_BITRATE: u32 = 128_000;
/// Default video bitrate (bits/second)
pub const DEFAULT_VIDEO_BITRATE: u32 = 800_000;
/// Default maximum output width
pub const DEFAULT_MAX_WIDTH: u32 = 1280;
/// Default maximum output height
pub const DEFAULT_MAX_HEIGHT: u32 = 720;
/// Default quality factor
pub const DEFAULT_QUALITY: f64 = 0.8;
/// Lowest video bitrate the quality adjustment may produce
pub const MIN_VIDEO_BITRATE: u32 = 64_000;
/// Smallest accepted `maxWidth`/`maxHeight`; 4:2:0 output needs even sides.
pub const MIN_DIMENSION_BOUND: u32 = 2;

pub const KEY_AUDIO_BITRATE: &str = "audioBitrate";
pub const KEY_AUDIO_CODEC: &str = "audioCodec";
pub const KEY_VIDEO_BITRATE: &str = "videoBitrate";
pub const KEY_VIDEO_CODEC: &str = "videoCodec";
pub const KEY_MAX_WIDTH: &str = "maxWidth";
pub const KEY_MAX_HEIGHT: &str = "maxHeight";
pub const KEY_QUALITY: &str = "quality";
pub const KEY_OPTIMIZE_FOR_NETWORK: &str = "optimizeForNetwork";

/// A settings value that could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for '{key}': {reason}")]
pub struct SettingsError {
    /// The offending settings key
    pub key: String,
    /// Why the value was rejected
    pub reason: String,
}

impl SettingsError {
    pub fn new(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Target video codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
}

impl VideoCodec {
    pub const ALL: [VideoCodec; 2] = [VideoCodec::H264, VideoCodec::Hevc];

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "h264",
            VideoCodec::Hevc => "hevc",
        }
    }

    /// FFmpeg encoder implementing this codec.
    pub fn encoder(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "libx264",
            VideoCodec::Hevc => "libx265",
        }
    }

    /// Sample entry tag for MP4 output, when the muxer default is not playable everywhere.
    pub fn mp4_tag(&self) -> Option<&'static str> {
        match self {
            VideoCodec::H264 => None,
            VideoCodec::Hevc => Some("hvc1"),
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h264" | "avc" | "libx264" => Ok(VideoCodec::H264),
            "hevc" | "h265" | "libx265" => Ok(VideoCodec::Hevc),
            other => Err(format!(
                "unsupported video codec '{}' (expected one of: h264, hevc)",
                other
            )),
        }
    }
}

/// Target audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, JsonSchema, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    #[default]
    Aac,
    Mp3,
}

impl AudioCodec {
    pub const ALL: [AudioCodec; 2] = [AudioCodec::Aac, AudioCodec::Mp3];

    pub fn as_str(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "mp3",
        }
    }

    /// FFmpeg encoder implementing this codec.
    pub fn encoder(&self) -> &'static str {
        match self {
            AudioCodec::Aac => "aac",
            AudioCodec::Mp3 => "libmp3lame",
        }
    }
}

impl fmt::Display for AudioCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AudioCodec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aac" => Ok(AudioCodec::Aac),
            "mp3" | "libmp3lame" => Ok(AudioCodec::Mp3),
            other => Err(format!(
                "unsupported audio codec '{}' (expected one of: aac, mp3)",
                other
            )),
        }
    }
}

/// Validated recompression settings.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Target audio bitrate in bits per second
    pub audio_bitrate: u32,
    /// Target audio codec
    pub audio_codec: AudioCodec,
    /// Target (maximum) video bitrate in bits per second
    pub video_bitrate: u32,
    /// Target video codec
    pub video_codec: VideoCodec,
    /// Maximum output width in pixels
    #[schemars(range(min = 2))]
    pub max_width: u32,
    /// Maximum output height in pixels
    #[schemars(range(min = 2))]
    pub max_height: u32,
    /// Quality factor in (0, 1]; scales the video bitrate
    pub quality: f64,
    /// Move the MP4 index to the front of the file for progressive playback
    pub optimize_for_network: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            audio_bitrate: DEFAULT_AUDIO_BITRATE,
            audio_codec: AudioCodec::default(),
            video_bitrate: DEFAULT_VIDEO_BITRATE,
            video_codec: VideoCodec::default(),
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            quality: DEFAULT_QUALITY,
            optimize_for_network: false,
        }
    }
}

impl Settings {
    /// Parse settings from an untyped key/value map.
    ///
    /// Unknown keys are ignored; missing or `null` keys take their defaults.
    /// The first malformed value fails the whole parse, naming its key.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, SettingsError> {
        let settings = Self {
            audio_bitrate: positive_u32(map, KEY_AUDIO_BITRATE, DEFAULT_AUDIO_BITRATE)?,
            audio_codec: codec(map, KEY_AUDIO_CODEC, AudioCodec::default())?,
            video_bitrate: positive_u32(map, KEY_VIDEO_BITRATE, DEFAULT_VIDEO_BITRATE)?,
            video_codec: codec(map, KEY_VIDEO_CODEC, VideoCodec::default())?,
            max_width: min_u32(map, KEY_MAX_WIDTH, DEFAULT_MAX_WIDTH, MIN_DIMENSION_BOUND)?,
            max_height: min_u32(map, KEY_MAX_HEIGHT, DEFAULT_MAX_HEIGHT, MIN_DIMENSION_BOUND)?,
            quality: quality(map)?,
            optimize_for_network: boolean(map, KEY_OPTIMIZE_FOR_NETWORK, false)?,
        };
        Ok(settings)
    }

    /// Parse settings from any JSON value; `null` means "all defaults".
    pub fn from_value(value: &Value) -> Result<Self, SettingsError> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(map) => Self::from_map(map),
            other => Err(SettingsError::new(
                "settings",
                format!("expected an object, got {}", type_name(other)),
            )),
        }
    }

    /// Video bitrate after applying the quality factor.
    pub fn effective_video_bitrate(&self) -> u32 {
        let scaled = (f64::from(self.video_bitrate) * self.quality).round() as u32;
        scaled
            .max(MIN_VIDEO_BITRATE.min(self.video_bitrate))
            .min(self.video_bitrate)
    }
}

impl TryFrom<&Map<String, Value>> for Settings {
    type Error = SettingsError;

    fn try_from(map: &Map<String, Value>) -> Result<Self, Self::Error> {
        Settings::from_map(map)
    }
}

fn present<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

fn positive_u32(map: &Map<String, Value>, key: &str, default: u32) -> Result<u32, SettingsError> {
    min_u32(map, key, default, 1)
}

fn min_u32(
    map: &Map<String, Value>,
    key: &str,
    default: u32,
    min: u32,
) -> Result<u32, SettingsError> {
    let Some(value) = present(map, key) else {
        return Ok(default);
    };
    let n = as_integer(value)
        .ok_or_else(|| SettingsError::new(key, format!("expected an integer, got {}", value)))?;
    if n < i64::from(min) {
        let reason = if min == 1 {
            format!("must be greater than zero, got {}", n)
        } else {
            format!("must be at least {}, got {}", min, n)
        };
        return Err(SettingsError::new(key, reason));
    }
    u32::try_from(n).map_err(|_| SettingsError::new(key, format!("{} is out of range", n)))
}

fn quality(map: &Map<String, Value>) -> Result<f64, SettingsError> {
    let Some(value) = present(map, KEY_QUALITY) else {
        return Ok(DEFAULT_QUALITY);
    };
    let q = as_float(value).ok_or_else(|| {
        SettingsError::new(KEY_QUALITY, format!("expected a number, got {}", value))
    })?;
    if q <= 0.0 || q > 1.0 {
        return Err(SettingsError::new(
            KEY_QUALITY,
            format!("must be in the range (0, 1], got {}", q),
        ));
    }
    Ok(q)
}

fn boolean(map: &Map<String, Value>, key: &str, default: bool) -> Result<bool, SettingsError> {
    match present(map, key) {
        None => Ok(default),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(other) => Err(SettingsError::new(
            key,
            format!("expected a boolean, got {}", other),
        )),
    }
}

fn codec<C>(map: &Map<String, Value>, key: &str, default: C) -> Result<C, SettingsError>
where
    C: FromStr<Err = String>,
{
    match present(map, key) {
        None => Ok(default),
        Some(Value::String(s)) => s.parse().map_err(|reason| SettingsError::new(key, reason)),
        Some(other) => Err(SettingsError::new(
            key,
            format!("expected a string, got {}", type_name(other)),
        )),
    }
}
