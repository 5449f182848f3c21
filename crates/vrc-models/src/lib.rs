//! Shared data models for the video recompression engine.
//!
//! This crate provides Serde-serializable types for:
//! - Recompression settings and their validation
//! - Source media metadata
//! - Processing decisions and results
//! - Engine capabilities

pub mod capabilities;
pub mod decision;
pub mod invocation;
pub mod media;
pub mod result;
pub mod settings;
pub mod utils;

// Re-export common types
pub use capabilities::{Capabilities, OUTPUT_CONTAINER};
pub use decision::{Action, Decision, DecisionReason};
pub use invocation::InvocationId;
pub use media::{MediaInfo, SourceInfo, NO_AUDIO, UNKNOWN_CODEC};
pub use result::ProcessingResult;
pub use settings::{AudioCodec, Settings, SettingsError, VideoCodec};
pub use utils::format_file_size;
