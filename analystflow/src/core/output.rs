//! Stage output type with factory methods.

use super::StageStatus;
use crate::errors::{ErrorKind, StageError};
use crate::records::StageValue;
use serde::{Deserialize, Serialize};

/// The outcome of one stage within a run.
///
/// `StageOutput` is immutable once created and provides factory methods
/// for creating outputs with different statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutput {
    /// The status of the stage execution.
    pub status: StageStatus,

    /// The value the stage wrote, or the stored value it reused on skip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<StageValue>,

    /// The executor error (for failed executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StageError>,

    /// Skip reason (for skipped executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,

    /// Cancel reason (for cancelled executions).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,

    /// Inputs that never became available (for blocked stages).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub waiting_on: Vec<String>,

    /// Wall-clock duration of the executor call in milliseconds.
    #[serde(default)]
    pub duration_ms: f64,
}

impl StageOutput {
    fn with_status(status: StageStatus) -> Self {
        Self {
            status,
            value: None,
            error: None,
            skip_reason: None,
            cancel_reason: None,
            waiting_on: Vec::new(),
            duration_ms: 0.0,
        }
    }

    /// Creates a successful output carrying the written value.
    #[must_use]
    pub fn ok(value: StageValue) -> Self {
        Self {
            value: Some(value),
            ..Self::with_status(StageStatus::Ok)
        }
    }

    /// Creates a skip output that reuses the stored value.
    #[must_use]
    pub fn skip(reason: impl Into<String>, existing: Option<StageValue>) -> Self {
        Self {
            value: existing,
            skip_reason: Some(reason.into()),
            ..Self::with_status(StageStatus::Skip)
        }
    }

    /// Creates a cancel output with a reason.
    #[must_use]
    pub fn cancel(reason: impl Into<String>) -> Self {
        Self {
            cancel_reason: Some(reason.into()),
            ..Self::with_status(StageStatus::Cancel)
        }
    }

    /// Creates a failure output from an executor error.
    #[must_use]
    pub fn fail(error: StageError) -> Self {
        Self {
            error: Some(error),
            ..Self::with_status(StageStatus::Fail)
        }
    }

    /// Creates a blocked output listing the inputs that never arrived.
    #[must_use]
    pub fn blocked(waiting_on: Vec<String>) -> Self {
        Self {
            waiting_on,
            ..Self::with_status(StageStatus::Blocked)
        }
    }

    /// Sets the measured duration.
    #[must_use]
    pub const fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Returns true if the output status indicates success.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the output status indicates failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.status.is_failure()
    }

    /// Returns the error classification for non-successful outputs.
    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.status {
            StageStatus::Fail => self.error.as_ref().map(StageError::kind),
            StageStatus::Cancel => Some(ErrorKind::Cancelled),
            StageStatus::Blocked => Some(ErrorKind::MissingDependency),
            _ => None,
        }
    }

    /// Returns a one-line human-readable description of the outcome.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.status {
            StageStatus::Ok => format!(
                "completed with {} record(s)",
                self.value.as_ref().map_or(0, StageValue::record_count)
            ),
            StageStatus::Skip => format!(
                "skipped ({})",
                self.skip_reason.as_deref().unwrap_or("no reason given")
            ),
            StageStatus::Fail => self
                .error
                .as_ref()
                .map_or_else(|| "failed".to_string(), ToString::to_string),
            StageStatus::Cancel => format!(
                "cancelled ({})",
                self.cancel_reason.as_deref().unwrap_or("no reason given")
            ),
            StageStatus::Blocked => format!("blocked on {}", self.waiting_on.join(", ")),
            StageStatus::Pending | StageStatus::Running => self.status.to_string(),
        }
    }
}
