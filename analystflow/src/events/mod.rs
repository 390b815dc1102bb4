//! Typed pipeline events and the sinks that receive them.
//!
//! The stage graph reports its progress as [`PipelineEvent`] values. Sinks
//! are purely observational: a sink can never fail or slow down a run.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

use crate::errors::ErrorKind;
use serde::Serialize;
use uuid::Uuid;

/// A lifecycle event emitted while a stage graph runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum PipelineEvent {
    /// A run began.
    #[serde(rename = "run.started")]
    RunStarted {
        /// The run.
        run_id: Uuid,
        /// Pipeline name.
        pipeline: String,
        /// Number of stages in the graph.
        stages: usize,
    },
    /// A stage's executor was invoked.
    #[serde(rename = "stage.started")]
    StageStarted {
        /// The run.
        run_id: Uuid,
        /// Stage name.
        stage: String,
    },
    /// A stage wrote its output.
    #[serde(rename = "stage.completed")]
    StageCompleted {
        /// The run.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Records in the written container.
        records: usize,
        /// Executor duration.
        duration_ms: f64,
    },
    /// A stage was not executed because its output already existed.
    #[serde(rename = "stage.skipped")]
    StageSkipped {
        /// The run.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Why the stage was skipped.
        reason: String,
    },
    /// A stage's executor failed.
    #[serde(rename = "stage.failed")]
    StageFailed {
        /// The run.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Error classification.
        kind: ErrorKind,
        /// Error message.
        error: String,
        /// Executor duration.
        duration_ms: f64,
    },
    /// A stage could not run because an upstream stage did not succeed.
    #[serde(rename = "stage.blocked")]
    StageBlocked {
        /// The run.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Inputs that never became available.
        waiting_on: Vec<String>,
    },
    /// A stage was abandoned due to cancellation.
    #[serde(rename = "stage.cancelled")]
    StageCancelled {
        /// The run.
        run_id: Uuid,
        /// Stage name.
        stage: String,
        /// Cancellation reason.
        reason: String,
    },
    /// A run finished.
    #[serde(rename = "run.completed")]
    RunCompleted {
        /// The run.
        run_id: Uuid,
        /// True when every stage succeeded or was skipped.
        complete: bool,
        /// Total run duration.
        duration_ms: f64,
    },
}

impl PipelineEvent {
    /// Returns the dotted event type, e.g. `stage.completed`.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RunStarted { .. } => "run.started",
            Self::StageStarted { .. } => "stage.started",
            Self::StageCompleted { .. } => "stage.completed",
            Self::StageSkipped { .. } => "stage.skipped",
            Self::StageFailed { .. } => "stage.failed",
            Self::StageBlocked { .. } => "stage.blocked",
            Self::StageCancelled { .. } => "stage.cancelled",
            Self::RunCompleted { .. } => "run.completed",
        }
    }

    /// Returns the stage the event refers to, if any.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::StageStarted { stage, .. }
            | Self::StageCompleted { stage, .. }
            | Self::StageSkipped { stage, .. }
            | Self::StageFailed { stage, .. }
            | Self::StageBlocked { stage, .. }
            | Self::StageCancelled { stage, .. } => Some(stage),
            Self::RunStarted { .. } | Self::RunCompleted { .. } => None,
        }
    }

    /// Returns the run the event belongs to.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StageStarted { run_id, .. }
            | Self::StageCompleted { run_id, .. }
            | Self::StageSkipped { run_id, .. }
            | Self::StageFailed { run_id, .. }
            | Self::StageBlocked { run_id, .. }
            | Self::StageCancelled { run_id, .. }
            | Self::RunCompleted { run_id, .. } => *run_id,
        }
    }
}
