//! Error types for the analystflow engine.
//!
//! Each concern has its own `thiserror` enum. [`AnalystflowError`] aggregates
//! them for callers that cross module boundaries, and every error reports an
//! [`ErrorKind`] so tool-facing code can tag results without matching on
//! concrete types.

use crate::config::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Machine-readable classification shared by all errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A referenced file or directory does not exist.
    NotFound,
    /// A file extension or MIME type outside the supported set.
    UnsupportedType,
    /// No configured encoding could decode the bytes, or the PDF is unreadable.
    DecodeError,
    /// The document holds no content. This is a warning, not a failure.
    Empty,
    /// A stage output did not match its record schema.
    SchemaViolation,
    /// A stage executor failed (provider error, timeout, quota).
    ExecutionError,
    /// A report could not be written to its destination.
    WriteError,
    /// A stage was scheduled before one of its inputs existed.
    MissingDependency,
    /// The run or stage was cancelled.
    Cancelled,
    /// The pipeline definition is invalid.
    InvalidPipeline,
    /// A write would overwrite an existing stage output.
    OutputConflict,
    /// A signal arrived that the current coordinator state cannot accept.
    InvalidState,
    /// Configuration could not be loaded or is invalid.
    Config,
    /// Unexpected I/O failure.
    Io,
    /// Internal invariant broken.
    Internal,
}

impl ErrorKind {
    /// Returns true when the kind should be surfaced as a warning.
    #[must_use]
    pub const fn is_warning(self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the snake_case tag used in tool results.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::UnsupportedType => "unsupported_type",
            Self::DecodeError => "decode_error",
            Self::Empty => "empty",
            Self::SchemaViolation => "schema_violation",
            Self::ExecutionError => "execution_error",
            Self::WriteError => "write_error",
            Self::MissingDependency => "missing_dependency",
            Self::Cancelled => "cancelled",
            Self::InvalidPipeline => "invalid_pipeline",
            Self::OutputConflict => "output_conflict",
            Self::InvalidState => "invalid_state",
            Self::Config => "config",
            Self::Io => "io",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The main error type for analystflow operations.
#[derive(Debug, Error)]
pub enum AnalystflowError {
    /// A pipeline validation error occurred.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// A cycle was detected in the pipeline.
    #[error("{0}")]
    CycleDetected(#[from] CycleDetectedError),

    /// A stage ran before its inputs existed.
    #[error("{0}")]
    MissingDependency(#[from] MissingDependencyError),

    /// A stage read an input it never declared.
    #[error("{0}")]
    UndeclaredDependency(#[from] UndeclaredDependencyError),

    /// A stage output would have been overwritten.
    #[error("{0}")]
    OutputConflict(#[from] OutputConflictError),

    /// Document ingestion failed.
    #[error("{0}")]
    Ingestion(#[from] IngestionError),

    /// A stage executor failed.
    #[error("{0}")]
    Stage(#[from] StageError),

    /// Report export failed.
    #[error("{0}")]
    Export(#[from] ExportError),

    /// Configuration failed to load or validate.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The coordinator received a signal it cannot handle in its current state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AnalystflowError {
    /// Returns the error classification.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) | Self::CycleDetected(_) => ErrorKind::InvalidPipeline,
            Self::MissingDependency(_) | Self::UndeclaredDependency(_) => {
                ErrorKind::MissingDependency
            }
            Self::OutputConflict(_) => ErrorKind::OutputConflict,
            Self::Ingestion(e) => e.kind(),
            Self::Stage(e) => e.kind(),
            Self::Export(e) => e.kind(),
            Self::Config(_) => ErrorKind::Config,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CONTRACT-004-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Fills in the default fix hint for the code when none was given.
    #[must_use]
    pub fn with_default_hint(mut self) -> Self {
        if self.fix_hint.is_none() {
            self.fix_hint = ContractSuggestions::get(&self.code).map(str::to_string);
        }
        self
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// The stages involved in the error.
    pub stages: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stages: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the stages involved.
    #[must_use]
    pub fn with_stages(mut self, stages: Vec<String>) -> Self {
        self.stages = stages;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    /// Returns the contract code, if any.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.error_info.as_ref().map(|info| info.code.as_str())
    }
}

/// Error raised when a cycle is detected in the pipeline graph.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in pipeline: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of stages forming the cycle.
    pub cycle_path: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        let info = ContractErrorInfo::new(
            "CONTRACT-004-CYCLE",
            format!("Pipeline contains a dependency cycle: {}", cycle_path.join(" -> ")),
        )
        .with_fix_hint("Remove one of the inputs in the cycle to break it.");

        Self {
            cycle_path,
            error_info: info,
        }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self {
            message: err.to_string(),
            stages: err.cycle_path.clone(),
            error_info: Some(err.error_info),
        }
    }
}

/// Raised when a stage is scheduled before one of its declared inputs exists.
///
/// This is a programming error in the graph, not a user error: the scheduler
/// only releases a stage once every producer has finished.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage}' was scheduled before its input '{input}' existed")]
pub struct MissingDependencyError {
    /// The stage being scheduled.
    pub stage: String,
    /// The absent input.
    pub input: String,
}

impl MissingDependencyError {
    /// Creates a new missing dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            input: input.into(),
        }
    }
}

/// Error raised when writing to an existing output in the run state.
#[derive(Debug, Clone, Error)]
#[error("Output conflict: '{key}' already holds a value")]
pub struct OutputConflictError {
    /// The conflicting output key.
    pub key: String,
}

impl OutputConflictError {
    /// Creates a new output conflict error.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

/// Error raised when accessing an undeclared dependency.
#[derive(Debug, Clone, Error)]
#[error("Undeclared dependency: stage '{stage}' attempted to access '{key}' which was not declared as an input")]
pub struct UndeclaredDependencyError {
    /// The stage attempting access.
    pub stage: String,
    /// The undeclared key.
    pub key: String,
}

impl UndeclaredDependencyError {
    /// Creates a new undeclared dependency error.
    #[must_use]
    pub fn new(stage: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            key: key.into(),
        }
    }
}

/// Errors raised while locating, reading or saving documents.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// The path does not exist.
    #[error("File not found: {}", path.display())]
    NotFound {
        /// The missing path.
        path: PathBuf,
    },

    /// The extension or MIME type is not supported.
    #[error("Unsupported file type '{found}'. Supported: {}", supported.join(", "))]
    UnsupportedType {
        /// The rejected extension or MIME type.
        found: String,
        /// The supported set.
        supported: Vec<String>,
    },

    /// The bytes could not be decoded.
    #[error("Could not decode {}: {reason}", path.display())]
    Decode {
        /// The file being decoded.
        path: PathBuf,
        /// Why decoding failed.
        reason: String,
    },

    /// The file holds no text.
    #[error("{} is empty", path.display())]
    Empty {
        /// The empty file.
        path: PathBuf,
    },

    /// An unexpected filesystem error.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl IngestionError {
    /// Wraps an I/O error, promoting "not found" to [`IngestionError::NotFound`].
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound { path }
        } else {
            Self::Io { path, source }
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::UnsupportedType { .. } => ErrorKind::UnsupportedType,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Empty { .. } => ErrorKind::Empty,
            Self::Io { .. } => ErrorKind::Io,
        }
    }
}

/// Errors produced by a stage executor.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageError {
    /// The output did not match the stage's record schema.
    #[error("Stage '{stage}' output violates its schema: {detail}")]
    SchemaViolation {
        /// The stage name.
        stage: String,
        /// What was wrong with the output.
        detail: String,
    },

    /// The executor failed.
    #[error("Stage '{stage}' execution failed: {reason}")]
    Execution {
        /// The stage name.
        stage: String,
        /// The failure reason.
        reason: String,
    },

    /// The executor was abandoned because the run was cancelled.
    #[error("Stage '{stage}' cancelled: {reason}")]
    Cancelled {
        /// The stage name.
        stage: String,
        /// The cancellation reason.
        reason: String,
    },
}

impl StageError {
    /// Creates a schema violation error.
    #[must_use]
    pub fn schema_violation(stage: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::SchemaViolation {
            stage: stage.into(),
            detail: detail.into(),
        }
    }

    /// Creates an execution error.
    #[must_use]
    pub fn execution(stage: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Execution {
            stage: stage.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates the execution error reported when a stage exceeds its timeout.
    #[must_use]
    pub fn timeout(stage: impl Into<String>, limit: Duration) -> Self {
        Self::Execution {
            stage: stage.into(),
            reason: format!("timed out after {:.1}s", limit.as_secs_f64()),
        }
    }

    /// Creates a cancellation error.
    #[must_use]
    pub fn cancelled(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Cancelled {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    /// Returns the stage the error belongs to.
    #[must_use]
    pub fn stage(&self) -> &str {
        match self {
            Self::SchemaViolation { stage, .. }
            | Self::Execution { stage, .. }
            | Self::Cancelled { stage, .. } => stage,
        }
    }

    /// Returns the error detail without the stage prefix.
    #[must_use]
    pub fn detail(&self) -> &str {
        match self {
            Self::SchemaViolation { detail, .. } => detail,
            Self::Execution { reason, .. } | Self::Cancelled { reason, .. } => reason,
        }
    }

    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::SchemaViolation { .. } => ErrorKind::SchemaViolation,
            Self::Execution { .. } => ErrorKind::ExecutionError,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }
}

/// Errors raised while exporting reports.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Writing to a local destination failed.
    #[error("Failed to write report to {destination}: {source}")]
    Write {
        /// The attempted destination.
        destination: String,
        /// The underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// Uploading to a bucket failed.
    #[error("Failed to upload report to {destination}: {reason}")]
    Upload {
        /// The attempted destination.
        destination: String,
        /// The store's failure reason.
        reason: String,
    },

    /// A bucket destination was requested but no object store is configured.
    #[error("No object store configured for {destination}")]
    NoObjectStore {
        /// The attempted destination.
        destination: String,
    },

    /// Export was requested before every stage output existed.
    #[error("Cannot export: missing outputs for {}", missing.join(", "))]
    MissingOutputs {
        /// The absent output keys.
        missing: Vec<String>,
    },
}

impl ExportError {
    /// Returns the error classification.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Write { .. } | Self::Upload { .. } | Self::NoObjectStore { .. } => {
                ErrorKind::WriteError
            }
            Self::MissingOutputs { .. } => ErrorKind::MissingDependency,
        }
    }

    /// Returns the destination the export was aimed at, if any.
    #[must_use]
    pub fn destination(&self) -> Option<&str> {
        match self {
            Self::Write { destination, .. }
            | Self::Upload { destination, .. }
            | Self::NoObjectStore { destination } => Some(destination),
            Self::MissingOutputs { .. } => None,
        }
    }
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CONTRACT-004-CYCLE" => Some(
                "Check stage inputs for circular references. \
                 Use a linear chain or fan-out pattern instead.",
            ),
            "CONTRACT-004-MISSING_DEP" => Some(
                "Every input must be the document or the output of another stage. \
                 Add the producing stage or drop the input.",
            ),
            "CONTRACT-004-DUPLICATE_STAGE" => Some("Give every stage a unique name."),
            "CONTRACT-004-DUPLICATE_OUTPUT" => Some(
                "Each output key may be written by exactly one stage.",
            ),
            "CONTRACT-004-EMPTY" => Some("Add at least one stage to the pipeline before building."),
            _ => None,
        }
    }
}
