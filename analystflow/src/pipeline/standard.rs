//! The business-analysis stage graph.
//!
//! ```text
//! document -> ur_agent -> { ac_agent, do_agent } -> uc_agent
//! ```

use super::{PipelineBuilder, StageGraph, StageSpec};
use crate::config::ModelConfig;
use crate::errors::PipelineValidationError;
use crate::llm::LlmClient;
use crate::records::{
    ActorsOutput, DataObjectsOutput, InputKey, StageKey, UseCasesOutput, UserRequirementsOutput,
};
use crate::stages::{AgentProfile, AnalysisStage, Stage};
use std::sync::Arc;

/// Pipeline name of the standard graph.
pub const PIPELINE_NAME: &str = "business_analysis";

/// Requirements-extraction stage.
pub const REQUIREMENTS_STAGE: &str = "ur_agent";
/// Actor-extraction stage.
pub const ACTORS_STAGE: &str = "ac_agent";
/// Data-object-extraction stage.
pub const DATA_OBJECTS_STAGE: &str = "do_agent";
/// Use-case synthesis stage.
pub const USE_CASES_STAGE: &str = "uc_agent";

/// Returns the stage name producing `key`.
#[must_use]
pub const fn stage_name(key: StageKey) -> &'static str {
    match key {
        StageKey::Requirements => REQUIREMENTS_STAGE,
        StageKey::Actors => ACTORS_STAGE,
        StageKey::DataObjects => DATA_OBJECTS_STAGE,
        StageKey::UseCases => USE_CASES_STAGE,
    }
}

/// Returns the declared inputs of the stage producing `key`.
#[must_use]
pub fn stage_inputs(key: StageKey) -> Vec<InputKey> {
    match key {
        StageKey::Requirements => vec![InputKey::Document],
        StageKey::Actors | StageKey::DataObjects => vec![StageKey::Requirements.into()],
        StageKey::UseCases => vec![
            StageKey::Requirements.into(),
            StageKey::Actors.into(),
            StageKey::DataObjects.into(),
        ],
    }
}

/// Builds the standard graph with caller-supplied executors.
///
/// # Errors
///
/// Returns an error only if a runner breaks graph validation.
pub fn standard_graph_with<F>(mut runner_for: F) -> Result<StageGraph, PipelineValidationError>
where
    F: FnMut(StageKey) -> Arc<dyn Stage>,
{
    StageKey::ALL
        .into_iter()
        .try_fold(PipelineBuilder::new(PIPELINE_NAME), |builder, key| {
            builder.stage(
                StageSpec::new(stage_name(key), key, runner_for(key)).with_inputs(stage_inputs(key)),
            )
        })?
        .build()
}

/// Builds the standard graph backed by model agents.
///
/// # Errors
///
/// Returns an error only if graph validation fails.
pub fn business_analysis_graph(
    llm: Arc<dyn LlmClient>,
    models: &ModelConfig,
) -> Result<StageGraph, PipelineValidationError> {
    standard_graph_with(|key| agent_for(key, Arc::clone(&llm), models))
}

fn agent_for(key: StageKey, llm: Arc<dyn LlmClient>, models: &ModelConfig) -> Arc<dyn Stage> {
    let name = stage_name(key);
    let model = models.model_for(key);
    match key {
        StageKey::Requirements => Arc::new(AnalysisStage::<UserRequirementsOutput>::new(
            profile::<UserRequirementsOutput>(name, model, models),
            llm,
        )),
        StageKey::Actors => Arc::new(AnalysisStage::<ActorsOutput>::new(
            profile::<ActorsOutput>(name, model, models),
            llm,
        )),
        StageKey::DataObjects => Arc::new(AnalysisStage::<DataObjectsOutput>::new(
            profile::<DataObjectsOutput>(name, model, models),
            llm,
        )),
        StageKey::UseCases => Arc::new(AnalysisStage::<UseCasesOutput>::new(
            profile::<UseCasesOutput>(name, model, models),
            llm,
        )),
    }
}

fn profile<R: crate::records::StageRecord>(
    name: &str,
    model: &str,
    models: &ModelConfig,
) -> AgentProfile {
    AgentProfile::for_record::<R>(name, model).with_sampling(models.temperature, models.top_p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;

    #[test]
    fn test_stage_inputs() {
        assert_eq!(stage_inputs(StageKey::Requirements), vec![InputKey::Document]);
        assert_eq!(stage_inputs(StageKey::UseCases).len(), 3);
    }

    #[test]
    fn test_business_analysis_graph_names_and_order() {
        let graph =
            business_analysis_graph(Arc::new(MockLlmClient::new()), &ModelConfig::default()).unwrap();

        assert_eq!(graph.name(), PIPELINE_NAME);
        assert_eq!(graph.stage_names(), vec!["ur_agent", "ac_agent", "do_agent", "uc_agent"]);
        assert_eq!(graph.waves().len(), 3);
        assert_eq!(
            graph.stage(USE_CASES_STAGE).map(|spec| spec.inputs.clone()),
            Some(stage_inputs(StageKey::UseCases))
        );
    }
}
