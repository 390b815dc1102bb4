//! Stage specifications and run options.

use crate::errors::{ContractErrorInfo, PipelineValidationError};
use crate::records::{InputKey, StageKey};
use crate::stages::Stage;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Specification for a single stage in a pipeline.
///
/// Declared once when the graph is built and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct StageSpec {
    /// The unique name of the stage.
    pub name: String,
    /// The stage implementation.
    pub runner: Arc<dyn Stage>,
    /// Declared inputs, in order.
    pub inputs: Vec<InputKey>,
    /// The single output key this stage writes.
    pub output: StageKey,
}

impl StageSpec {
    /// Creates a new stage specification with no inputs.
    #[must_use]
    pub fn new(name: impl Into<String>, output: StageKey, runner: Arc<dyn Stage>) -> Self {
        Self {
            name: name.into(),
            runner,
            inputs: Vec::new(),
            output,
        }
    }

    /// Adds an input.
    #[must_use]
    pub fn with_input(mut self, input: impl Into<InputKey>) -> Self {
        self.inputs.push(input.into());
        self
    }

    /// Adds several inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: impl IntoIterator<Item = InputKey>) -> Self {
        self.inputs.extend(inputs);
        self
    }

    /// Returns the stage outputs this stage reads.
    pub fn stage_inputs(&self) -> impl Iterator<Item = StageKey> + '_ {
        self.inputs.iter().filter_map(|input| match input {
            InputKey::Stage(key) => Some(*key),
            InputKey::Document => None,
        })
    }

    /// Validates the stage specification.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is blank, the stage reads its own
    /// output, or an input is declared twice.
    pub fn validate(&self) -> Result<(), PipelineValidationError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new(
                "Stage name cannot be empty or whitespace-only",
            ));
        }

        if self.stage_inputs().any(|key| key == self.output) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' cannot read its own output '{}'",
                self.name, self.output
            ))
            .with_stages(vec![self.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-CYCLE",
                    format!("Stage '{}' depends on itself", self.name),
                )
                .with_default_hint(),
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.inputs.iter().find(|input| !seen.insert(**input)) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' declares input '{}' more than once",
                self.name, dup
            ))
            .with_stages(vec![self.name.clone()]));
        }

        Ok(())
    }
}

/// Whether existing outputs are reused or recomputed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipPolicy {
    /// Skip any stage whose output key already holds records.
    #[default]
    SkipExisting,
    /// Re-execute every stage and replace its output.
    AlwaysRerun,
}

/// Per-run scheduling options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// The skip policy.
    pub skip_policy: SkipPolicy,
    /// Stages the user explicitly asked to re-run.
    pub force: HashSet<StageKey>,
}

impl RunOptions {
    /// Creates options with the default skip policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the skip policy.
    #[must_use]
    pub const fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    /// Forces the stage producing `key` to re-run.
    #[must_use]
    pub fn force(mut self, key: StageKey) -> Self {
        self.force.insert(key);
        self
    }

    /// Returns true if the stage producing `key` must execute even when its
    /// output exists.
    #[must_use]
    pub fn should_rerun(&self, key: StageKey) -> bool {
        self.skip_policy == SkipPolicy::AlwaysRerun || self.force.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubStage;

    fn stub(name: &str) -> Arc<dyn Stage> {
        Arc::new(StubStage::empty(name, StageKey::Actors))
    }

    #[test]
    fn test_spec_inputs() {
        let spec = StageSpec::new("ac_agent", StageKey::Actors, stub("ac_agent"))
            .with_input(InputKey::Document)
            .with_input(StageKey::Requirements);

        assert_eq!(spec.inputs.len(), 2);
        assert_eq!(spec.stage_inputs().collect::<Vec<_>>(), [StageKey::Requirements]);
        assert!(spec.validate().is_ok());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let spec = StageSpec::new("ac_agent", StageKey::Actors, stub("ac_agent"))
            .with_input(StageKey::Actors);
        let err = spec.validate().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-CYCLE"));
    }

    #[test]
    fn test_duplicate_input_rejected() {
        let spec = StageSpec::new("ac_agent", StageKey::Actors, stub("ac_agent"))
            .with_inputs([InputKey::Document, InputKey::Document]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_blank_name_rejected() {
        let spec = StageSpec::new("  ", StageKey::Actors, stub("x"));
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_run_options_rerun_rules() {
        let default = RunOptions::new();
        assert!(!default.should_rerun(StageKey::Actors));

        let forced = RunOptions::new().force(StageKey::Actors);
        assert!(forced.should_rerun(StageKey::Actors));
        assert!(!forced.should_rerun(StageKey::UseCases));

        let always = RunOptions::new().with_skip_policy(SkipPolicy::AlwaysRerun);
        assert!(always.should_rerun(StageKey::Requirements));
    }
}
