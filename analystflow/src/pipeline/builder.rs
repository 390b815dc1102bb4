//! Pipeline builder with validation.

use super::{StageGraph, StageSpec};
use crate::errors::{ContractErrorInfo, CycleDetectedError, PipelineValidationError};
use crate::records::{InputKey, StageKey};
use std::collections::{HashMap, HashSet};

/// Builder for creating validated stage graphs.
///
/// Stages may be added in any order; producers for every declared input are
/// checked at [`PipelineBuilder::build`] time, together with cycles.
#[derive(Debug, Clone)]
pub struct PipelineBuilder {
    /// The pipeline name.
    name: String,
    /// The stage specifications, in declaration order.
    stages: Vec<StageSpec>,
}

impl PipelineBuilder {
    /// Creates a new pipeline builder.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
        }
    }

    /// Adds a stage to the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is invalid or clashes with an existing
    /// stage name or output key.
    pub fn stage(mut self, spec: StageSpec) -> Result<Self, PipelineValidationError> {
        self.add_stage_spec(spec)?;
        Ok(self)
    }

    /// Adds a stage with a specification.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn add_stage_spec(&mut self, spec: StageSpec) -> Result<(), PipelineValidationError> {
        spec.validate()?;

        if let Some(existing) = self.stages.iter().find(|s| s.name == spec.name) {
            return Err(PipelineValidationError::new(format!(
                "Stage '{}' is declared twice",
                existing.name
            ))
            .with_stages(vec![spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-DUPLICATE_STAGE",
                    format!("Duplicate stage name '{}'", spec.name),
                )
                .with_default_hint(),
            ));
        }

        if let Some(existing) = self.stages.iter().find(|s| s.output == spec.output) {
            return Err(PipelineValidationError::new(format!(
                "Stages '{}' and '{}' both write '{}'",
                existing.name, spec.name, spec.output
            ))
            .with_stages(vec![existing.name.clone(), spec.name.clone()])
            .with_error_info(
                ContractErrorInfo::new(
                    "CONTRACT-004-DUPLICATE_OUTPUT",
                    format!("Output '{}' has more than one producer", spec.output),
                )
                .with_default_hint(),
            ));
        }

        self.stages.push(spec);
        Ok(())
    }

    /// Builds the stage graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the builder has no stages, an input has no
    /// producer, or the inputs form a cycle.
    pub fn build(self) -> Result<StageGraph, PipelineValidationError> {
        if self.stages.is_empty() {
            return Err(PipelineValidationError::new("Pipeline has no stages").with_error_info(
                ContractErrorInfo::new("CONTRACT-004-EMPTY", "Cannot build an empty pipeline")
                    .with_default_hint(),
            ));
        }

        self.check_producers()?;
        self.detect_cycles()?;

        Ok(StageGraph::new(self.name, self.stages))
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    fn producers(&self) -> HashMap<StageKey, &str> {
        self.stages
            .iter()
            .map(|spec| (spec.output, spec.name.as_str()))
            .collect()
    }

    fn check_producers(&self) -> Result<(), PipelineValidationError> {
        let producers = self.producers();
        for spec in &self.stages {
            for input in spec.inputs.iter().copied() {
                let InputKey::Stage(key) = input else {
                    continue;
                };
                if !producers.contains_key(&key) {
                    return Err(PipelineValidationError::new(format!(
                        "Stage '{}' reads '{}' but no stage produces it",
                        spec.name, key
                    ))
                    .with_stages(vec![spec.name.clone()])
                    .with_error_info(
                        ContractErrorInfo::new(
                            "CONTRACT-004-MISSING_DEP",
                            format!("Input '{key}' has no producer"),
                        )
                        .with_context_entry("stage", &spec.name)
                        .with_default_hint(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Detects cycles in the dependency graph.
    fn detect_cycles(&self) -> Result<(), CycleDetectedError> {
        let producers = self.producers();
        let edges: HashMap<&str, Vec<&str>> = self
            .stages
            .iter()
            .map(|spec| {
                let deps = spec
                    .stage_inputs()
                    .filter_map(|key| producers.get(&key).copied())
                    .collect();
                (spec.name.as_str(), deps)
            })
            .collect();

        let mut visited = HashSet::new();
        let mut rec_stack = HashSet::new();
        let mut path = Vec::new();

        for spec in &self.stages {
            if !visited.contains(spec.name.as_str()) {
                if let Some(cycle) =
                    dfs_cycle(&spec.name, &edges, &mut visited, &mut rec_stack, &mut path)
                {
                    return Err(CycleDetectedError::new(cycle));
                }
            }
        }

        Ok(())
    }
}

fn dfs_cycle<'a>(
    node: &'a str,
    edges: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    for dep in edges.get(node).into_iter().flatten().copied() {
        if !visited.contains(dep) {
            if let Some(cycle) = dfs_cycle(dep, edges, visited, rec_stack, path) {
                return Some(cycle);
            }
        } else if rec_stack.contains(dep) {
            let cycle_start = path.iter().position(|n| *n == dep).unwrap_or(0);
            let mut cycle: Vec<String> = path[cycle_start..].iter().map(|s| (*s).to_string()).collect();
            cycle.push(dep.to_string());
            return Some(cycle);
        }
    }

    path.pop();
    rec_stack.remove(node);
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stages::Stage;
    use crate::testing::StubStage;
    use std::sync::Arc;

    fn spec(name: &str, output: StageKey) -> StageSpec {
        let runner: Arc<dyn Stage> = Arc::new(StubStage::empty(name, output));
        StageSpec::new(name, output, runner)
    }

    #[test]
    fn test_builder_creation() {
        let builder = PipelineBuilder::new("test");
        assert_eq!(builder.name(), "test");
        assert_eq!(builder.stage_count(), 0);
    }

    #[test]
    fn test_builder_accepts_any_declaration_order() {
        let graph = PipelineBuilder::new("test")
            .stage(spec("ac_agent", StageKey::Actors).with_input(StageKey::Requirements))
            .unwrap()
            .stage(spec("ur_agent", StageKey::Requirements).with_input(InputKey::Document))
            .unwrap()
            .build()
            .unwrap();

        assert_eq!(graph.stage_count(), 2);
    }

    #[test]
    fn test_builder_missing_producer() {
        let err = PipelineBuilder::new("test")
            .stage(spec("ac_agent", StageKey::Actors).with_input(StageKey::Requirements))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-MISSING_DEP"));
        assert_eq!(err.stages, ["ac_agent"]);
    }

    #[test]
    fn test_builder_duplicate_stage_name() {
        let err = PipelineBuilder::new("test")
            .stage(spec("ur_agent", StageKey::Requirements))
            .unwrap()
            .stage(spec("ur_agent", StageKey::Actors))
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE_STAGE"));
    }

    #[test]
    fn test_builder_duplicate_output() {
        let err = PipelineBuilder::new("test")
            .stage(spec("ur_agent", StageKey::Requirements))
            .unwrap()
            .stage(spec("ur_agent_v2", StageKey::Requirements))
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-DUPLICATE_OUTPUT"));
        assert!(err.error_info.unwrap().fix_hint.is_some());
    }

    #[test]
    fn test_builder_cycle_detection() {
        let err = PipelineBuilder::new("test")
            .stage(spec("ac_agent", StageKey::Actors).with_input(StageKey::UseCases))
            .unwrap()
            .stage(spec("uc_agent", StageKey::UseCases).with_input(StageKey::Actors))
            .unwrap()
            .build()
            .unwrap_err();

        assert_eq!(err.code(), Some("CONTRACT-004-CYCLE"));
        assert!(err.message.contains("ac_agent -> uc_agent -> ac_agent"));
    }

    #[test]
    fn test_builder_empty_build() {
        let err = PipelineBuilder::new("test").build().unwrap_err();
        assert_eq!(err.code(), Some("CONTRACT-004-EMPTY"));
    }
}
