//! Engine error types.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use vrc_media::MediaError;
use vrc_models::SettingsError;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid settings: invalid value for '{key}': {reason}")]
    InvalidSettings { key: String, reason: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("Unreadable media {}: {reason}", .path.display())]
    UnreadableMedia { path: PathBuf, reason: String },

    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcode failed: {0}")]
    Transcode(String),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Where a [`MediaError`] surfaced; decides which [`EngineError`] it becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStage {
    /// Probing the source file
    Probe,
    /// Passthrough copy
    Copy,
    /// FFmpeg recompression
    Transcode,
    /// Probing the staged output before commit
    Verify,
}

/// Serialisable error summary for callers across a process boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
}

impl EngineError {
    pub fn unreadable(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::UnreadableMedia {
            path: path.as_ref().to_path_buf(),
            reason: reason.into(),
        }
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn transcode(reason: impl Into<String>) -> Self {
        Self::Transcode(reason.into())
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::InvalidSettings { .. } => "INVALID_SETTINGS",
            EngineError::FileNotFound(_) => "FILE_NOT_FOUND",
            EngineError::UnreadableMedia { .. } => "UNREADABLE_MEDIA",
            EngineError::Io { .. } => "IO_ERROR",
            EngineError::Transcode(_) => "TRANSCODE_ERROR",
            EngineError::Cancelled => "CANCELLED",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }

    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }

    /// Classify a media failure by the stage it happened in.
    ///
    /// `path` is the file the stage was working on.
    pub fn from_media(err: MediaError, stage: MediaStage, path: &Path) -> Self {
        match (stage, err) {
            (_, MediaError::Cancelled) => EngineError::Cancelled,
            (MediaStage::Probe | MediaStage::Copy, MediaError::FileNotFound(p)) => {
                EngineError::FileNotFound(p)
            }
            (MediaStage::Probe, MediaError::Io(source)) => EngineError::io(path, source),
            (MediaStage::Probe, other) => EngineError::unreadable(path, other.detail()),
            (MediaStage::Copy, MediaError::Io(source)) => EngineError::io(path, source),
            (MediaStage::Copy, other) => {
                EngineError::io(path, std::io::Error::other(other.detail()))
            }
            (MediaStage::Transcode, MediaError::Io(source)) => EngineError::io(path, source),
            (MediaStage::Transcode, other) => EngineError::Transcode(other.detail()),
            (MediaStage::Verify, other) => {
                EngineError::Transcode(format!("output verification failed: {}", other.detail()))
            }
        }
    }
}

impl From<SettingsError> for EngineError {
    fn from(err: SettingsError) -> Self {
        EngineError::InvalidSettings {
            key: err.key,
            reason: err.reason,
        }
    }
}
