//! Context management for pipeline execution.
//!
//! This module provides:
//! - The session-scoped [`RunState`] holding the document and stage outputs
//! - Strict, typed [`StageInputs`] handed to each executor
//! - Pipeline and stage execution contexts

mod execution;
mod identity;
mod inputs;
mod run_state;

pub use execution::{PipelineContext, StageContext, DEFAULT_STAGE_TIMEOUT};
pub use identity::RunIdentity;
pub use inputs::StageInputs;
pub use run_state::{RunState, SourceDocument};
