//! Filesystem utilities for all-or-nothing output files.
//!
//! Every output is first written to a hidden staging file next to its final
//! path and only renamed into place once it is complete. A staging file that
//! is dropped before [`StagedOutput::commit`] is removed, so an aborted run
//! never leaves a partial file at the destination.

use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufReader};
use tracing::debug;

use crate::cancel::CancelSignal;
use crate::error::{MediaError, MediaResult};

/// Buffer size used when streaming a passthrough copy.
const COPY_BUFFER_BYTES: usize = 1024 * 1024;

/// A staging file that becomes `target` on commit.
#[derive(Debug)]
pub struct StagedOutput {
    temp: TempPath,
    target: PathBuf,
}

impl StagedOutput {
    /// Create an empty staging file in the target's directory.
    ///
    /// The directory is created if it does not exist yet. Staging on the same
    /// filesystem keeps the final rename atomic.
    pub async fn create(target: impl AsRef<Path>) -> MediaResult<Self> {
        let target = target.as_ref().to_path_buf();
        let file_name = target
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                MediaError::internal(format!(
                    "output path {} has no file name",
                    target.display()
                ))
            })?
            .to_string();

        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).await?;

        let temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".partial")
            .tempfile_in(&dir)?
            .into_temp_path();

        debug!(staging = %temp.display(), target = %target.display(), "Created staging file");
        Ok(Self { temp, target })
    }

    /// Path the producer should write to.
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Size of the staged file in bytes.
    pub async fn size(&self) -> MediaResult<u64> {
        Ok(fs::metadata(self.path()).await?.len())
    }

    /// Atomically move the staging file to its target, replacing any
    /// existing file there.
    pub fn commit(self) -> MediaResult<PathBuf> {
        let target = self.target;
        self.temp
            .persist(&target)
            .map_err(|e| MediaError::Io(e.error))?;
        Ok(target)
    }
}

/// Copy `src` to `dst` byte for byte via a staging file.
///
/// Returns the number of bytes copied. When `cancel` fires mid-copy the
/// staging file is discarded and `dst` is left untouched.
pub async fn copy_atomic(
    src: impl AsRef<Path>,
    dst: impl AsRef<Path>,
    cancel: Option<CancelSignal>,
) -> MediaResult<u64> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    let source = match fs::File::open(src).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(MediaError::FileNotFound(src.to_path_buf()));
        }
        Err(e) => return Err(MediaError::Io(e)),
    };

    let staged = StagedOutput::create(dst).await?;
    let mut writer = fs::OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(staged.path())
        .await?;
    let mut reader = BufReader::with_capacity(COPY_BUFFER_BYTES, source);

    let copy = async {
        let copied = tokio::io::copy_buf(&mut reader, &mut writer).await?;
        writer.flush().await?;
        writer.sync_all().await?;
        Ok::<u64, std::io::Error>(copied)
    };

    let copied = match cancel {
        Some(mut cancel) => {
            if cancel.is_cancelled() {
                return Err(MediaError::Cancelled);
            }
            tokio::select! {
                result = copy => result?,
                _ = cancel.cancelled() => return Err(MediaError::Cancelled),
            }
        }
        None => copy.await?,
    };

    drop(writer);
    staged.commit()?;
    debug!(src = %src.display(), dst = %dst.display(), bytes = copied, "Copied file");
    Ok(copied)
}
