//! Execution contexts for pipeline runs and individual stages.

use super::{RunIdentity, RunState, StageInputs};
use crate::cancellation::CancellationToken;
use crate::events::{EventSink, NoOpEventSink, PipelineEvent};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Default upper bound on a single stage executor call.
pub const DEFAULT_STAGE_TIMEOUT: Duration = Duration::from_secs(300);

/// The context shared by every stage of one pipeline run.
pub struct PipelineContext {
    /// Run identity.
    identity: RunIdentity,
    /// The session's run state.
    run_state: Arc<RunState>,
    /// Event sink for emitting events.
    event_sink: Arc<dyn EventSink>,
    /// Cooperative cancellation for the run.
    cancellation: Arc<CancellationToken>,
    /// Bound on each executor call.
    stage_timeout: Duration,
}

impl PipelineContext {
    /// Creates a new pipeline context over a run state.
    #[must_use]
    pub fn new(identity: RunIdentity, run_state: Arc<RunState>) -> Self {
        Self {
            identity,
            run_state,
            event_sink: Arc::new(NoOpEventSink),
            cancellation: Arc::new(CancellationToken::new()),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
        }
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, token: Arc<CancellationToken>) -> Self {
        self.cancellation = token;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub const fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Returns the run identity.
    #[must_use]
    pub const fn identity(&self) -> &RunIdentity {
        &self.identity
    }

    /// Returns the run ID.
    #[must_use]
    pub const fn run_id(&self) -> Uuid {
        self.identity.run_id
    }

    /// Returns the run state.
    #[must_use]
    pub const fn run_state(&self) -> &Arc<RunState> {
        &self.run_state
    }

    /// Returns the cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &Arc<CancellationToken> {
        &self.cancellation
    }

    /// Returns the per-stage timeout.
    #[must_use]
    pub const fn stage_timeout(&self) -> Duration {
        self.stage_timeout
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Hands an event to the sink.
    pub fn emit(&self, event: &PipelineEvent) {
        self.event_sink.try_emit(event);
    }
}

impl std::fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineContext")
            .field("identity", &self.identity)
            .field("outputs", &self.run_state.len())
            .field("cancelled", &self.is_cancelled())
            .field("stage_timeout", &self.stage_timeout)
            .finish_non_exhaustive()
    }
}

/// The context for a single stage execution.
#[derive(Debug)]
pub struct StageContext {
    /// The pipeline context.
    pipeline_ctx: Arc<PipelineContext>,
    /// The stage name.
    stage_name: String,
    /// The stage inputs.
    inputs: StageInputs,
}

impl StageContext {
    /// Creates a new stage context.
    #[must_use]
    pub fn new(
        pipeline_ctx: Arc<PipelineContext>,
        stage_name: impl Into<String>,
        inputs: StageInputs,
    ) -> Self {
        Self {
            pipeline_ctx,
            stage_name: stage_name.into(),
            inputs,
        }
    }

    /// Returns the stage name.
    #[must_use]
    pub fn stage_name(&self) -> &str {
        &self.stage_name
    }

    /// Returns the stage inputs.
    #[must_use]
    pub const fn inputs(&self) -> &StageInputs {
        &self.inputs
    }

    /// Returns the pipeline context.
    #[must_use]
    pub const fn pipeline_ctx(&self) -> &Arc<PipelineContext> {
        &self.pipeline_ctx
    }

    /// Returns the run ID.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.pipeline_ctx.run_id()
    }

    /// Returns true once cancellation has been requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.pipeline_ctx.is_cancelled()
    }
}
