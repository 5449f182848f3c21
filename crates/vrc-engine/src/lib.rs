//! Video recompression engine.
//!
//! This crate provides:
//! - The passthrough-or-recompress decision
//! - Staged, atomically committed execution of that decision
//! - The `Recompressor` entry point with cancellation and progress
//! - Bounded batch processing
//! - Structured invocation logging and metrics

pub mod batch;
pub mod config;
pub mod decision;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod recompressor;
pub mod report;
pub mod state;

pub use batch::{parse_manifest, run_batch, BatchJob, BatchOutcome};
pub use config::EngineConfig;
pub use decision::{decide, target_dimensions, DEFAULT_SIZE_THRESHOLD_BYTES};
pub use error::{EngineError, EngineResult, ErrorReport};
pub use logging::InvocationLogger;
pub use recompressor::{InvocationOptions, Recompressor};
pub use state::InvocationState;

pub use vrc_media::{CancelHandle, CancelSignal, MediaBackend, ProgressCallback};
pub use vrc_models::{
    Action, Capabilities, Decision, DecisionReason, MediaInfo, ProcessingResult, Settings,
    SourceInfo,
};
