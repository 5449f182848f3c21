//! Processing actions and decisions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the engine does with a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Copy the input unchanged
    Passthrough,
    /// Scale, re-encode and re-mux
    Recompress,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Passthrough => "passthrough",
            Action::Recompress => "recompress",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why an action was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// Source fits the dimension bounds and the size threshold
    WithinLimits,
    /// Source is wider or taller than allowed
    ExceedsDimensions,
    /// Source fits the bounds but is larger than the size threshold
    ExceedsSize,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionReason::WithinLimits => "within_limits",
            DecisionReason::ExceedsDimensions => "exceeds_dimensions",
            DecisionReason::ExceedsSize => "exceeds_size",
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the decision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub action: Action,
    pub reason: DecisionReason,
    /// Output width; equals the source width on passthrough
    pub target_width: u32,
    /// Output height; equals the source height on passthrough
    pub target_height: u32,
}

impl Decision {
    pub fn is_passthrough(&self) -> bool {
        self.action == Action::Passthrough
    }
}
