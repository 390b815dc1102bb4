use crate::errors::{AnalystflowError, ErrorKind, ExportError, IngestionError, StageError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Uniform result of a user-facing operation.
///
/// Serializes as `{"status": "...", "message": "...", "detail": {...}}`,
/// with `kind` added for warnings and errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    /// The operation succeeded.
    Success {
        /// Human-readable message.
        message: String,
        /// Machine-readable detail.
        #[serde(default)]
        detail: Value,
    },
    /// The operation succeeded with a caveat.
    Warning {
        /// Classification of the caveat.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
        /// Machine-readable detail.
        #[serde(default)]
        detail: Value,
    },
    /// The operation failed.
    Error {
        /// Classification of the failure.
        kind: ErrorKind,
        /// Human-readable message.
        message: String,
        /// Machine-readable detail.
        #[serde(default)]
        detail: Value,
    },
}

impl ToolResult {
    /// Creates a success result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
            detail: Value::Null,
        }
    }

    /// Creates a warning result.
    #[must_use]
    pub fn warning(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Warning {
            kind,
            message: message.into(),
            detail: Value::Null,
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
            detail: Value::Null,
        }
    }

    /// Replaces the detail payload.
    #[must_use]
    pub fn with_detail(mut self, value: Value) -> Self {
        match &mut self {
            Self::Success { detail, .. }
            | Self::Warning { detail, .. }
            | Self::Error { detail, .. } => *detail = value,
        }
        self
    }

    /// Returns the status tag.
    #[must_use]
    pub const fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
        }
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. }
            | Self::Warning { message, .. }
            | Self::Error { message, .. } => message,
        }
    }

    /// Returns the detail payload.
    #[must_use]
    pub const fn detail(&self) -> &Value {
        match self {
            Self::Success { detail, .. }
            | Self::Warning { detail, .. }
            | Self::Error { detail, .. } => detail,
        }
    }

    /// Returns the classification of a warning or error.
    #[must_use]
    pub const fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Success { .. } => None,
            Self::Warning { kind, .. } | Self::Error { kind, .. } => Some(*kind),
        }
    }

    /// Returns true unless this is an error.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        !matches!(self, Self::Error { .. })
    }

    /// Returns true for an error result.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

fn from_kind(kind: ErrorKind, message: String, detail: Value) -> ToolResult {
    if kind.is_warning() {
        ToolResult::warning(kind, message).with_detail(detail)
    } else {
        ToolResult::error(kind, message).with_detail(detail)
    }
}

impl From<&IngestionError> for ToolResult {
    fn from(err: &IngestionError) -> Self {
        let detail = match err {
            IngestionError::NotFound { path }
            | IngestionError::Empty { path }
            | IngestionError::Io { path, .. } => json!({ "path": path.display().to_string() }),
            IngestionError::Decode { path, reason } => {
                json!({ "path": path.display().to_string(), "reason": reason })
            }
            IngestionError::UnsupportedType { found, supported } => {
                json!({ "found": found, "supported": supported })
            }
        };
        from_kind(err.kind(), err.to_string(), detail)
    }
}

impl From<&StageError> for ToolResult {
    fn from(err: &StageError) -> Self {
        let detail = serde_json::to_value(err).unwrap_or(Value::Null);
        from_kind(err.kind(), err.to_string(), detail)
    }
}

impl From<&ExportError> for ToolResult {
    fn from(err: &ExportError) -> Self {
        let detail = match err {
            ExportError::MissingOutputs { missing } => json!({ "missing": missing }),
            other => json!({ "destination": other.destination() }),
        };
        from_kind(err.kind(), err.to_string(), detail)
    }
}

impl From<&AnalystflowError> for ToolResult {
    fn from(err: &AnalystflowError) -> Self {
        match err {
            AnalystflowError::Ingestion(e) => e.into(),
            AnalystflowError::Stage(e) => e.into(),
            AnalystflowError::Export(e) => e.into(),
            other => from_kind(other.kind(), other.to_string(), Value::Null),
        }
    }
}

impl From<AnalystflowError> for ToolResult {
    fn from(err: AnalystflowError) -> Self {
        Self::from(&err)
    }
}
