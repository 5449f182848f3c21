//! Invocation metrics.
//!
//! Emitted through the `metrics` facade; the embedding application decides
//! which recorder (if any) is installed.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const INVOCATIONS_TOTAL: &str = "vrc_invocations_total";
    pub const PROCESSING_MS: &str = "vrc_processing_ms";
    pub const BYTES_SAVED_TOTAL: &str = "vrc_bytes_saved_total";
    pub const INVOCATIONS_IN_FLIGHT: &str = "vrc_invocations_in_flight";
}

/// Record a finished invocation.
///
/// `action` is empty when the invocation failed before a decision was made.
pub fn record_invocation(action: &str, outcome: &str, processing_ms: f64) {
    let labels = [
        ("action", action.to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::INVOCATIONS_TOTAL, &labels).increment(1);
    histogram!(names::PROCESSING_MS, &labels).record(processing_ms);
}

/// Record bytes saved by a recompression.
pub fn record_bytes_saved(original_bytes: u64, final_bytes: u64) {
    counter!(names::BYTES_SAVED_TOTAL).increment(original_bytes.saturating_sub(final_bytes));
}

/// Update the in-flight invocations gauge.
pub fn set_in_flight(count: usize) {
    gauge!(names::INVOCATIONS_IN_FLIGHT).set(count as f64);
}
