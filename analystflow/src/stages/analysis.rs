//! Two-phase analysis agents.
//!
//! Each agent makes two ordinary model calls: a free-form analysis over the
//! rendered inputs, then an extraction call that turns the analysis into the
//! stage's record container. Only the extraction result is validated and
//! written; the analysis text is never stored.

use super::Stage;
use crate::context::{StageContext, StageInputs};
use crate::errors::StageError;
use crate::llm::{prompts, CompletionRequest, LlmClient, DEFAULT_TEMPERATURE, DEFAULT_TOP_P};
use crate::records::{SchemaValidator, StageRecord, StageValue};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Model settings and prompt template for one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    /// Stage name, also used in error attribution.
    pub name: String,
    /// Model identifier for both calls.
    pub model: String,
    /// Analysis prompt template.
    pub analysis_template: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus-sampling cutoff.
    pub top_p: f32,
}

impl AgentProfile {
    /// Creates a profile with default sampling and the stage's default template.
    #[must_use]
    pub fn for_record<R: StageRecord>(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            analysis_template: prompts::analysis_template(R::KEY).to_string(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }

    /// Overrides the analysis template.
    #[must_use]
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.analysis_template = template.into();
        self
    }

    /// Overrides the sampling parameters.
    #[must_use]
    pub const fn with_sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }
}

/// An analysis/extraction agent producing the container `R`.
pub struct AnalysisStage<R> {
    profile: AgentProfile,
    llm: Arc<dyn LlmClient>,
    validator: SchemaValidator<R>,
}

impl<R: StageRecord> AnalysisStage<R> {
    /// Creates an agent.
    #[must_use]
    pub fn new(profile: AgentProfile, llm: Arc<dyn LlmClient>) -> Self {
        let validator = SchemaValidator::new(profile.name.clone());
        Self {
            profile,
            llm,
            validator,
        }
    }

    /// Returns the agent profile.
    #[must_use]
    pub const fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    /// Runs the free-form analysis call over the rendered inputs.
    pub async fn analyze(&self, inputs: &StageInputs) -> Result<String, StageError> {
        let prompt = inputs.render_template(&self.profile.analysis_template);
        let request = CompletionRequest::new(&self.profile.model, prompts::ANALYSIS_SYSTEM, prompt)
            .with_sampling(self.profile.temperature, self.profile.top_p);

        self.llm
            .complete(request)
            .await
            .map_err(|e| StageError::execution(&self.profile.name, e))
    }

    /// Runs the extraction call and validates its output against `R`.
    pub async fn structure(&self, analysis: &str) -> Result<R, StageError> {
        let system = prompts::extraction_system(R::KEY, self.validator.hint());
        let request = CompletionRequest::new(&self.profile.model, system, analysis)
            .with_sampling(self.profile.temperature, self.profile.top_p)
            .json();

        let raw = self
            .llm
            .complete(request)
            .await
            .map_err(|e| StageError::execution(&self.profile.name, e))?;

        self.validator.parse_response(&raw)
    }
}

impl<R> std::fmt::Debug for AnalysisStage<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisStage")
            .field("profile", &self.profile)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R: StageRecord> Stage for AnalysisStage<R> {
    fn name(&self) -> &str {
        &self.profile.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageValue, StageError> {
        let analysis = self.analyze(ctx.inputs()).await?;
        debug!(
            stage = %self.profile.name,
            analysis_chars = analysis.len(),
            "Analysis call finished"
        );

        let record = self.structure(&analysis).await?;
        debug!(
            stage = %self.profile.name,
            records = record.record_count(),
            "Extraction validated"
        );

        Ok(record.into_value())
    }
}
