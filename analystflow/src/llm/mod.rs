//! The model-inference collaborator.
//!
//! Stages only see the [`LlmClient`] trait. The HTTP implementation talks to
//! an OpenAI-compatible chat-completions endpoint and lives behind the
//! `http` feature.

#[cfg(feature = "http")]
mod http;
pub mod prompts;

#[cfg(feature = "http")]
pub use http::HttpLlmClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default sampling temperature for every agent.
pub const DEFAULT_TEMPERATURE: f32 = 0.0;

/// Default nucleus-sampling cutoff for every agent.
pub const DEFAULT_TOP_P: f32 = 0.5;

/// One chat completion call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,
    /// System instruction.
    pub system: String,
    /// User message.
    pub user: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus-sampling cutoff.
    pub top_p: f32,
    /// Ask the provider for a JSON object response.
    pub json_output: bool,
}

impl CompletionRequest {
    /// Creates a request with default sampling parameters.
    #[must_use]
    pub fn new(model: impl Into<String>, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system: system.into(),
            user: user.into(),
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            json_output: false,
        }
    }

    /// Sets the sampling parameters.
    #[must_use]
    pub const fn with_sampling(mut self, temperature: f32, top_p: f32) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self
    }

    /// Requests a JSON object response.
    #[must_use]
    pub const fn json(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Errors returned by an [`LlmClient`].
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success status.
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The response carried no message content.
    #[error("response contained no content")]
    EmptyResponse,

    /// The client is misconfigured.
    #[error("client configuration error: {0}")]
    Config(String),
}

/// Invokes a language model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Sends one completion request and returns the message text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}
