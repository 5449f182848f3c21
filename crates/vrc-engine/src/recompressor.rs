//! Public entry point.

use serde_json::{Map, Value};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

use vrc_media::{CancelSignal, MediaBackend, ProgressCallback};
use vrc_models::{Action, Capabilities, InvocationId, MediaInfo, ProcessingResult, Settings};

use crate::config::EngineConfig;
use crate::decision::decide;
use crate::error::{EngineError, EngineResult, MediaStage};
use crate::executor::Executor;
use crate::logging::InvocationLogger;
use crate::metrics;
use crate::report::{build_result, summarize};
use crate::state::{InvocationState, StateTracker};

/// Optional per-invocation controls.
#[derive(Clone, Default)]
pub struct InvocationOptions {
    /// Aborts the invocation when fired
    pub cancel: Option<CancelSignal>,
    /// Receives the completed fraction in `0.0..=1.0`
    pub progress: Option<ProgressCallback>,
}

impl InvocationOptions {
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_progress(mut self, progress: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.progress = Some(Arc::new(progress));
        self
    }

    fn check_cancelled(&self) -> EngineResult<()> {
        if self.cancel.as_ref().is_some_and(CancelSignal::is_cancelled) {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }
}

/// Decides whether a video needs recompression and produces the output file.
///
/// Cheap to clone; clones share the backend. Invocations are independent and
/// may run concurrently.
#[derive(Clone)]
pub struct Recompressor {
    config: Arc<EngineConfig>,
    backend: Arc<dyn MediaBackend>,
}

impl Recompressor {
    /// Create a recompressor driving FFmpeg as configured.
    pub fn new(config: EngineConfig) -> Self {
        let backend = Arc::new(config.backend());
        Self::with_backend(config, backend)
    }

    pub fn from_env() -> Self {
        Self::new(EngineConfig::from_env())
    }

    pub fn with_backend(config: EngineConfig, backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process `input` into `output` using untyped settings.
    pub async fn process_video(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        settings: &Map<String, Value>,
    ) -> EngineResult<ProcessingResult> {
        self.process_video_with(input, output, settings, InvocationOptions::default())
            .await
    }

    /// Like [`process_video`](Self::process_video) with cancellation and progress.
    pub async fn process_video_with(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        settings: &Map<String, Value>,
        options: InvocationOptions,
    ) -> EngineResult<ProcessingResult> {
        let input = input.as_ref();
        let output = output.as_ref();
        let invocation_id = InvocationId::new();
        let logger = InvocationLogger::new(&invocation_id, "process_video");
        let span = logger.create_span();
        let options = InvocationOptions {
            progress: Some(logged_progress(logger.clone(), options.progress.clone())),
            ..options
        };

        async move {
            let started = Instant::now();
            let mut tracker = StateTracker::new(invocation_id.as_str());
            let mut action = None;

            logger.log_start(&format!("{} -> {}", input.display(), output.display()));

            let result = self
                .run(
                    &invocation_id,
                    input,
                    output,
                    settings,
                    &options,
                    &mut tracker,
                    &mut action,
                    started,
                )
                .await;

            let action_label = action.map(|a: Action| a.as_str()).unwrap_or("");
            let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;

            match &result {
                Ok(processed) => {
                    tracker.transition(InvocationState::Succeeded);
                    metrics::record_invocation(action_label, "succeeded", elapsed_ms);
                    if processed.action == Action::Recompress {
                        metrics::record_bytes_saved(
                            processed.original_info.size_bytes,
                            processed.final_info.size_bytes,
                        );
                    }
                    logger.log_completion(&summarize(processed));
                }
                Err(e) if e.is_cancelled() => {
                    tracker.transition(InvocationState::Cancelled);
                    metrics::record_invocation(action_label, "cancelled", elapsed_ms);
                    logger.log_warning("cancelled by caller");
                }
                Err(e) => {
                    tracker.transition(InvocationState::Failed);
                    metrics::record_invocation(action_label, "failed", elapsed_ms);
                    logger.log_error(e.code(), &e.to_string());
                }
            }

            result
        }
        .instrument(span)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn run(
        &self,
        invocation_id: &InvocationId,
        input: &Path,
        output: &Path,
        settings: &Map<String, Value>,
        options: &InvocationOptions,
        tracker: &mut StateTracker,
        action: &mut Option<Action>,
        started: Instant,
    ) -> EngineResult<ProcessingResult> {
        tracker.transition(InvocationState::Validating);
        let settings = Settings::from_map(settings)?;
        options.check_cancelled()?;

        tracker.transition(InvocationState::Probing);
        let source = self
            .backend
            .probe(input)
            .await
            .map_err(|e| EngineError::from_media(e, MediaStage::Probe, input))?;
        options.check_cancelled()?;

        tracker.transition(InvocationState::Deciding);
        let original_info = source.source_info();
        let decision = decide(&original_info, &settings, self.config.size_threshold_bytes);
        *action = Some(decision.action);
        tracing::info!(
            action = %decision.action,
            reason = %decision.reason,
            target_width = decision.target_width,
            target_height = decision.target_height,
            "Decision made"
        );
        options.check_cancelled()?;

        tracker.transition(InvocationState::Executing);
        let outcome = Executor::new(self.backend.as_ref())
            .with_cancel(options.cancel.clone())
            .with_progress(options.progress.clone())
            .execute(input, output, &source, &decision, &settings)
            .await?;

        Ok(build_result(
            invocation_id.clone(),
            original_info,
            outcome,
            started.elapsed(),
        ))
    }

    /// Probe `path` and return its metadata without producing any output.
    pub async fn analyze_video(&self, path: impl AsRef<Path>) -> EngineResult<MediaInfo> {
        let path = path.as_ref();
        self.backend
            .probe(path)
            .await
            .map_err(|e| EngineError::from_media(e, MediaStage::Probe, path))
    }

    /// Supported codecs, containers and features.
    pub fn capabilities(&self) -> Capabilities {
        Capabilities::new(
            format!("vrc ({})", self.backend.name()),
            env!("CARGO_PKG_VERSION"),
        )
    }
}

/// Wrap the caller's progress callback so each 25% step is logged once.
fn logged_progress(logger: InvocationLogger, inner: Option<ProgressCallback>) -> ProgressCallback {
    let reported = AtomicU32::new(0);
    Arc::new(move |fraction| {
        if let Some(step) = next_quarter(&reported, fraction) {
            logger.log_progress(&format!("{}%", step * 25));
        }
        if let Some(cb) = &inner {
            cb(fraction);
        }
    })
}

/// Quarter (1..=4) newly reached by `fraction`, if any.
fn next_quarter(reported: &AtomicU32, fraction: f64) -> Option<u32> {
    let step = (fraction.clamp(0.0, 1.0) * 4.0).floor() as u32;
    (step > 0 && reported.fetch_max(step, Ordering::Relaxed) < step).then_some(step)
}

impl std::fmt::Debug for Recompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recompressor")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}
