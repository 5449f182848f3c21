//! Result assembly.

use std::path::PathBuf;
use std::time::Duration;

use vrc_models::utils::duration_ms;
use vrc_models::{format_file_size, Action, InvocationId, ProcessingResult, SourceInfo};

/// What the executor produced for a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutcome {
    pub action: Action,
    pub output_path: PathBuf,
    pub final_info: SourceInfo,
}

/// Build the caller-facing result.
///
/// `elapsed` covers the whole invocation, from entry to commit.
pub fn build_result(
    invocation_id: InvocationId,
    original_info: SourceInfo,
    outcome: ExecutionOutcome,
    elapsed: Duration,
) -> ProcessingResult {
    ProcessingResult {
        invocation_id,
        output_path: outcome.output_path,
        action: outcome.action,
        processing_time_ms: duration_ms(elapsed),
        original_info,
        final_info: outcome.final_info,
    }
}

/// One-line human summary used in completion logs.
pub fn summarize(result: &ProcessingResult) -> String {
    format!(
        "{} {}x{} ({}) -> {}x{} ({}, {:.0}%) in {:.0} ms",
        result.action,
        result.original_info.width,
        result.original_info.height,
        format_file_size(result.original_info.size_bytes),
        result.final_info.width,
        result.final_info.height,
        format_file_size(result.final_info.size_bytes),
        result.size_ratio() * 100.0,
        result.processing_time_ms,
    )
}
