//! Step result domain types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of a single step. Evolves forward only:
/// `Pending -> Running -> {Fail | Success}`, with `Pending -> Fail` allowed for
/// steps cancelled by an earlier failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepResult {
    Pending,
    Running,
    Fail,
    Success,
}

impl StepResult {
    /// Commit-status `state` value understood by the source-control API
    pub fn state(&self) -> &'static str {
        match self {
            StepResult::Pending => "pending",
            StepResult::Running => "running",
            StepResult::Fail => "failed",
            StepResult::Success => "success",
        }
    }

    /// Whether `next` is a legal forward transition from `self`
    pub fn can_advance_to(&self, next: StepResult) -> bool {
        matches!(
            (self, next),
            (StepResult::Pending, StepResult::Running)
                | (StepResult::Pending, StepResult::Fail)
                | (StepResult::Running, StepResult::Fail)
                | (StepResult::Running, StepResult::Success)
        )
    }
}

impl fmt::Display for StepResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepResult::Pending => write!(f, "Pending"),
            StepResult::Running => write!(f, "Running"),
            StepResult::Fail => write!(f, "Fail"),
            StepResult::Success => write!(f, "Success"),
        }
    }
}
