//! Structured invocation logging utilities.
//!
//! Provides consistent, structured logging for recompression invocations
//! with tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use vrc_models::InvocationId;

/// Invocation logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct InvocationLogger {
    invocation_id: String,
    operation: String,
}

impl InvocationLogger {
    /// Create a logger for one invocation of `operation` (e.g. "process_video").
    pub fn new(invocation_id: &InvocationId, operation: &str) -> Self {
        Self {
            invocation_id: invocation_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            operation = %self.operation,
            "Invocation started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            operation = %self.operation,
            "Invocation progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            invocation_id = %self.invocation_id,
            operation = %self.operation,
            "Invocation warning: {}", message
        );
    }

    /// Log a failure with its machine-readable code.
    pub fn log_error(&self, code: &str, message: &str) {
        error!(
            invocation_id = %self.invocation_id,
            operation = %self.operation,
            code = %code,
            "Invocation failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            invocation_id = %self.invocation_id,
            operation = %self.operation,
            "Invocation completed: {}", message
        );
    }

    pub fn invocation_id(&self) -> &str {
        &self.invocation_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this invocation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "invocation",
            invocation_id = %self.invocation_id,
            operation = %self.operation
        )
    }
}
