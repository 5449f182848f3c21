//! Carries out a [`Decision`].
//!
//! Both paths write into a staging file beside the output and rename it into
//! place only after the result is complete (and, for recompression, probed).
//! Any error or cancellation drops the staging file instead.

use std::path::Path;
use tracing::{debug, info};

use vrc_media::{
    copy_atomic, CancelSignal, MediaBackend, ProgressCallback, StagedOutput, TranscodeJob,
};
use vrc_models::{Action, Decision, MediaInfo, Settings, SourceInfo};

use crate::error::{EngineError, EngineResult, MediaStage};
use crate::report::ExecutionOutcome;

/// Executes decisions against a [`MediaBackend`].
pub struct Executor<'a> {
    backend: &'a dyn MediaBackend,
    cancel: Option<CancelSignal>,
    progress: Option<ProgressCallback>,
}

impl<'a> Executor<'a> {
    pub fn new(backend: &'a dyn MediaBackend) -> Self {
        Self {
            backend,
            cancel: None,
            progress: None,
        }
    }

    pub fn with_cancel(mut self, cancel: Option<CancelSignal>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub async fn execute(
        &self,
        input: &Path,
        output: &Path,
        source: &MediaInfo,
        decision: &Decision,
        settings: &Settings,
    ) -> EngineResult<ExecutionOutcome> {
        match decision.action {
            Action::Passthrough => self.passthrough(input, output, source).await,
            Action::Recompress => self.recompress(input, output, source, decision, settings).await,
        }
    }

    async fn passthrough(
        &self,
        input: &Path,
        output: &Path,
        source: &MediaInfo,
    ) -> EngineResult<ExecutionOutcome> {
        let copied = copy_atomic(input, output, self.cancel.clone())
            .await
            .map_err(|e| EngineError::from_media(e, MediaStage::Copy, output))?;

        debug!(output = %output.display(), bytes = copied, "Passthrough copy committed");
        self.report_progress(1.0);

        Ok(ExecutionOutcome {
            action: Action::Passthrough,
            output_path: output.to_path_buf(),
            final_info: source.source_info().with_size(copied),
        })
    }

    async fn recompress(
        &self,
        input: &Path,
        output: &Path,
        source: &MediaInfo,
        decision: &Decision,
        settings: &Settings,
    ) -> EngineResult<ExecutionOutcome> {
        let staged = StagedOutput::create(output)
            .await
            .map_err(|e| EngineError::from_media(e, MediaStage::Transcode, output))?;

        let job = TranscodeJob {
            input: input.to_path_buf(),
            output: staged.path().to_path_buf(),
            settings: settings.clone(),
            width: decision.target_width,
            height: decision.target_height,
            duration_ms: source.duration_ms,
        };

        self.backend
            .transcode(&job, self.cancel.clone(), self.progress.clone())
            .await
            .map_err(|e| EngineError::from_media(e, MediaStage::Transcode, input))?;

        let produced = self
            .backend
            .probe(staged.path())
            .await
            .map_err(|e| EngineError::from_media(e, MediaStage::Verify, staged.path()))?;

        let final_info = SourceInfo::from(&produced);
        if !final_info.fits_within(settings.max_width, settings.max_height) {
            return Err(EngineError::transcode(format!(
                "output is {}x{}, exceeding {}x{}",
                produced.width, produced.height, settings.max_width, settings.max_height
            )));
        }

        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(EngineError::Cancelled);
        }

        let output_path = staged
            .commit()
            .map_err(|e| EngineError::from_media(e, MediaStage::Transcode, output))?;

        info!(
            output = %output_path.display(),
            width = produced.width,
            height = produced.height,
            size_bytes = produced.size_bytes,
            "Recompressed output committed"
        );

        Ok(ExecutionOutcome {
            action: Action::Recompress,
            output_path,
            final_info,
        })
    }

    fn report_progress(&self, fraction: f64) {
        if let Some(progress) = &self.progress {
            progress(fraction);
        }
    }
}
