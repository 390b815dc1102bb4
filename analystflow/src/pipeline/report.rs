//! Run reports.

use crate::core::{StageOutput, StageStatus};
use crate::records::StageKey;
use serde::Serialize;
use uuid::Uuid;

/// The outcome of one stage in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// Stage name.
    pub name: String,
    /// The key the stage writes.
    pub output_key: StageKey,
    /// What happened.
    pub output: StageOutput,
}

impl StageReport {
    /// Creates a stage report.
    #[must_use]
    pub fn new(name: impl Into<String>, output_key: StageKey, output: StageOutput) -> Self {
        Self {
            name: name.into(),
            output_key,
            output,
        }
    }

    /// Returns the stage status.
    #[must_use]
    pub const fn status(&self) -> StageStatus {
        self.output.status
    }
}

/// The result of running a stage graph once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// The run.
    pub run_id: Uuid,
    /// Pipeline name.
    pub pipeline: String,
    /// Per-stage outcomes in declaration order.
    pub stages: Vec<StageReport>,
    /// The graph's execution waves.
    pub waves: Vec<Vec<String>>,
    /// Total run duration in milliseconds.
    pub duration_ms: f64,
}

impl RunReport {
    /// Returns true if every stage completed or was skipped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stages.iter().all(|stage| stage.output.is_success())
    }

    /// Returns the report for a stage by name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|stage| stage.name == name)
    }

    /// Returns the report for the stage writing `key`.
    #[must_use]
    pub fn for_key(&self, key: StageKey) -> Option<&StageReport> {
        self.stages.iter().find(|stage| stage.output_key == key)
    }

    /// Returns the names of stages with the given status.
    #[must_use]
    pub fn with_status(&self, status: StageStatus) -> Vec<&str> {
        self.stages
            .iter()
            .filter(|stage| stage.status() == status)
            .map(|stage| stage.name.as_str())
            .collect()
    }

    /// Returns the stages that executed and wrote an output.
    #[must_use]
    pub fn completed(&self) -> Vec<&str> {
        self.with_status(StageStatus::Ok)
    }

    /// Returns the stages skipped because their output existed.
    #[must_use]
    pub fn skipped(&self) -> Vec<&str> {
        self.with_status(StageStatus::Skip)
    }

    /// Returns the stages whose executor failed.
    #[must_use]
    pub fn failed(&self) -> Vec<&str> {
        self.with_status(StageStatus::Fail)
    }

    /// Returns the stages that never ran because an input was unavailable.
    #[must_use]
    pub fn blocked(&self) -> Vec<&str> {
        self.with_status(StageStatus::Blocked)
    }

    /// Returns the stages abandoned due to cancellation.
    #[must_use]
    pub fn cancelled(&self) -> Vec<&str> {
        self.with_status(StageStatus::Cancel)
    }

    /// Returns a multi-line summary, one line per stage.
    #[must_use]
    pub fn summary(&self) -> String {
        self.stages
            .iter()
            .map(|stage| format!("{}: {}", stage.name, stage.output.describe()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StageError;
    use crate::testing::fixtures;

    fn report(stages: Vec<StageReport>) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            pipeline: "test".to_string(),
            stages,
            waves: Vec::new(),
            duration_ms: 1.0,
        }
    }

    #[test]
    fn test_complete_when_all_succeed_or_skip() {
        let run = report(vec![
            StageReport::new(
                "ur_agent",
                StageKey::Requirements,
                StageOutput::skip("exists", Some(fixtures::requirements_value())),
            ),
            StageReport::new("ac_agent", StageKey::Actors, StageOutput::ok(fixtures::actors_value())),
        ]);

        assert!(run.is_complete());
        assert_eq!(run.completed(), ["ac_agent"]);
        assert_eq!(run.skipped(), ["ur_agent"]);
    }

    #[test]
    fn test_incomplete_with_failure_and_blocked() {
        let run = report(vec![
            StageReport::new(
                "ac_agent",
                StageKey::Actors,
                StageOutput::fail(StageError::execution("ac_agent", "quota exceeded")),
            ),
            StageReport::new(
                "uc_agent",
                StageKey::UseCases,
                StageOutput::blocked(vec!["actors".to_string()]),
            ),
        ]);

        assert!(!run.is_complete());
        assert_eq!(run.failed(), ["ac_agent"]);
        assert_eq!(run.blocked(), ["uc_agent"]);
        assert_eq!(run.for_key(StageKey::UseCases).map(|s| s.name.as_str()), Some("uc_agent"));
        assert!(run.summary().contains("uc_agent: blocked on actors"));
    }
}
