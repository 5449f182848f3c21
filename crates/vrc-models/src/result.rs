//! Processing results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{Action, InvocationId, SourceInfo};

/// What a successful `process_video` call hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingResult {
    /// Invocation that produced this result
    pub invocation_id: InvocationId,
    /// Where the output was written
    pub output_path: PathBuf,
    /// Action that was taken
    pub action: Action,
    /// Wall time from invocation start to completion
    pub processing_time_ms: f64,
    /// Source metadata
    pub original_info: SourceInfo,
    /// Output metadata
    pub final_info: SourceInfo,
}

impl ProcessingResult {
    /// Output size as a fraction of the input size.
    pub fn size_ratio(&self) -> f64 {
        if self.original_info.size_bytes == 0 {
            return 1.0;
        }
        self.final_info.size_bytes as f64 / self.original_info.size_bytes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_ratio_and_serialization() {
        let result = ProcessingResult {
            invocation_id: InvocationId::from_string("inv-1"),
            output_path: PathBuf::from("/tmp/out.mp4"),
            action: Action::Recompress,
            processing_time_ms: 1234.5,
            original_info: SourceInfo::new(1920, 1080, 10_000, 8_000_000),
            final_info: SourceInfo::new(1280, 720, 10_000, 2_000_000),
        };

        assert!((result.size_ratio() - 0.25).abs() < 1e-9);

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["action"], "recompress");
        assert_eq!(value["outputPath"], "/tmp/out.mp4");
        assert_eq!(value["finalInfo"]["width"], 1280);
        assert_eq!(value["processingTimeMs"], 1234.5);
    }
}
