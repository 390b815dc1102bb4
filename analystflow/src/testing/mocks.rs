//! Stub stages and scripted model clients for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::context::StageContext;
use crate::errors::StageError;
use crate::llm::{CompletionRequest, LlmClient, LlmError};
use crate::records::{StageKey, StageValue};
use crate::stages::Stage;

/// A stage that returns a fixed result and counts its invocations.
#[derive(Debug)]
pub struct StubStage {
    name: String,
    result: Result<StageValue, StageError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen_inputs: Mutex<Vec<Vec<StageKey>>>,
}

impl StubStage {
    /// Creates a stub returning an empty container for `key`.
    #[must_use]
    pub fn empty(name: impl Into<String>, key: StageKey) -> Self {
        Self::returning(name, StageValue::empty(key))
    }

    /// Creates a stub returning `value`.
    #[must_use]
    pub fn returning(name: impl Into<String>, value: StageValue) -> Self {
        Self {
            name: name.into(),
            result: Ok(value),
            delay: None,
            calls: AtomicUsize::new(0),
            seen_inputs: Mutex::new(Vec::new()),
        }
    }

    /// Creates a stub that always fails with `error`.
    #[must_use]
    pub fn failing(name: impl Into<String>, error: StageError) -> Self {
        Self {
            result: Err(error),
            ..Self::empty(name, StageKey::Requirements)
        }
    }

    /// Sleeps for `delay` before answering.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns the number of times the executor was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns, per call, the stage keys that were present in the inputs.
    #[must_use]
    pub fn seen_inputs(&self) -> Vec<Vec<StageKey>> {
        self.seen_inputs.lock().clone()
    }
}

#[async_trait]
impl Stage for StubStage {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, ctx: &StageContext) -> Result<StageValue, StageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let present = StageKey::ALL
            .into_iter()
            .filter(|key| matches!(ctx.inputs().get_value(*key), Ok(Some(_))))
            .collect();
        self.seen_inputs.lock().push(present);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

/// A model client that answers from a queue of scripted responses.
///
/// Requests are recorded so tests can inspect the prompts that were sent.
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlm {
    /// Creates a client with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response.
    #[must_use]
    pub fn reply(self, text: impl Into<String>) -> Self {
        self.responses.lock().push_back(Ok(text.into()));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, error: LlmError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of unanswered scripted responses.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().push(request);
        self.responses
            .lock()
            .pop_front()
            .unwrap_or(Err(LlmError::EmptyResponse))
    }
}
