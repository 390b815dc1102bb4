//! Stage trait and implementations.
//!
//! A stage executor turns its declared inputs into exactly one
//! [`StageValue`]. The graph decides when it runs and where the value goes.

mod analysis;

pub use analysis::{AgentProfile, AnalysisStage};

use crate::context::StageContext;
use crate::errors::StageError;
use crate::records::StageValue;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline stage executors.
#[async_trait]
pub trait Stage: Send + Sync + Debug {
    /// Returns the name of the stage.
    fn name(&self) -> &str;

    /// Executes the stage.
    ///
    /// # Errors
    ///
    /// Returns `StageError::SchemaViolation` when the produced output does
    /// not match the record schema and `StageError::Execution` for any
    /// provider, network or quota failure.
    async fn execute(&self, ctx: &StageContext) -> Result<StageValue, StageError>;
}

/// A simple function-based stage.
pub struct FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageValue, StageError> + Send + Sync,
{
    name: String,
    func: F,
}

impl<F> FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageValue, StageError> + Send + Sync,
{
    /// Creates a new function-based stage.
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> Debug for FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageValue, StageError> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStage").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F> Stage for FnStage<F>
where
    F: Fn(&StageContext) -> Result<StageValue, StageError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageValue, StageError> {
        (self.func)(ctx)
    }
}
