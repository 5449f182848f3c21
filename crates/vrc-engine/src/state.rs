//! Per-invocation lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Lifecycle state of one `process_video` invocation.
///
/// Stages advance strictly in order; `Failed` and `Cancelled` can be
/// entered from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationState {
    Idle,
    Validating,
    Probing,
    Deciding,
    Executing,
    Succeeded,
    Failed,
    Cancelled,
}

impl InvocationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvocationState::Idle => "idle",
            InvocationState::Validating => "validating",
            InvocationState::Probing => "probing",
            InvocationState::Deciding => "deciding",
            InvocationState::Executing => "executing",
            InvocationState::Succeeded => "succeeded",
            InvocationState::Failed => "failed",
            InvocationState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InvocationState::Succeeded | InvocationState::Failed | InvocationState::Cancelled
        )
    }

    /// The single forward successor, if any.
    fn next(&self) -> Option<InvocationState> {
        match self {
            InvocationState::Idle => Some(InvocationState::Validating),
            InvocationState::Validating => Some(InvocationState::Probing),
            InvocationState::Probing => Some(InvocationState::Deciding),
            InvocationState::Deciding => Some(InvocationState::Executing),
            InvocationState::Executing => Some(InvocationState::Succeeded),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, to: InvocationState) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(to, InvocationState::Failed | InvocationState::Cancelled)
            || self.next() == Some(to)
    }
}

impl fmt::Display for InvocationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tracks and logs the state of a single invocation.
#[derive(Debug)]
pub struct StateTracker {
    invocation_id: String,
    state: InvocationState,
}

impl StateTracker {
    pub fn new(invocation_id: impl Into<String>) -> Self {
        Self {
            invocation_id: invocation_id.into(),
            state: InvocationState::Idle,
        }
    }

    pub fn state(&self) -> InvocationState {
        self.state
    }

    /// Move to `to`. Illegal transitions are ignored and reported as `false`.
    pub fn transition(&mut self, to: InvocationState) -> bool {
        if !self.state.can_transition_to(to) {
            debug!(
                invocation_id = %self.invocation_id,
                from = %self.state,
                to = %to,
                "Ignoring illegal state transition"
            );
            return false;
        }
        debug!(
            invocation_id = %self.invocation_id,
            from = %self.state,
            to = %to,
            "State transition"
        );
        self.state = to;
        true
    }
}
