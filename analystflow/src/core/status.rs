//! Stage status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The execution status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Stage completed successfully and wrote its output.
    Ok,
    /// Stage was skipped because its output already existed.
    Skip,
    /// Stage was cancelled before writing.
    Cancel,
    /// Stage failed.
    Fail,
    /// Stage never ran because an input-producing stage did not succeed.
    Blocked,
    /// Stage is pending execution.
    #[default]
    Pending,
    /// Stage is currently running.
    Running,
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Skip => write!(f, "skip"),
            Self::Cancel => write!(f, "cancel"),
            Self::Fail => write!(f, "fail"),
            Self::Blocked => write!(f, "blocked"),
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
        }
    }
}

impl StageStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Ok | Self::Skip | Self::Cancel | Self::Fail | Self::Blocked
        )
    }

    /// Returns true if the stage's output is available to dependents.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Ok | Self::Skip)
    }

    /// Returns true if the status indicates failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Fail | Self::Cancel | Self::Blocked)
    }
}
