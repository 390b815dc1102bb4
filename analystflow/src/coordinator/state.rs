//! Coordinator states and the signals that move between them.

use crate::export::Destination;
use crate::records::StageKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Where a session stands in the analysis workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// No document yet.
    #[default]
    AwaitingFile,
    /// A document was ingested and waits for the user's go-ahead.
    AwaitingConfirmation,
    /// The document is in the run state; the pipeline may start.
    ReadyToRunPipeline,
    /// A pipeline run is in flight.
    PipelineRunning,
    /// Every output exists; waiting for the user to accept export.
    AwaitingExportConfirmation,
    /// Reports were exported or export was declined.
    Done,
}

impl CoordinatorState {
    /// Returns the snake_case state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingFile => "awaiting_file",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::ReadyToRunPipeline => "ready_to_run_pipeline",
            Self::PipelineRunning => "pipeline_running",
            Self::AwaitingExportConfirmation => "awaiting_export_confirmation",
            Self::Done => "done",
        }
    }

    /// Returns true if a new document may be supplied.
    #[must_use]
    pub const fn accepts_document(self) -> bool {
        matches!(self, Self::AwaitingFile | Self::AwaitingConfirmation)
    }

    /// Returns true if a pipeline run may start.
    #[must_use]
    pub const fn accepts_run(self) -> bool {
        matches!(
            self,
            Self::ReadyToRunPipeline | Self::AwaitingExportConfirmation | Self::Done
        )
    }
}

impl fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input from the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum UserSignal {
    /// An uploaded payload, raw bytes or base64 text.
    Upload {
        /// The payload.
        payload: UploadPayload,
        /// Declared MIME type.
        mime: String,
    },
    /// A file already on disk.
    OpenFile {
        /// Path to the file.
        path: PathBuf,
    },
    /// Text typed or pasted directly.
    PasteText {
        /// The text.
        text: String,
    },
    /// Accept the pending step.
    Confirm,
    /// Reject the pending step.
    Decline,
    /// Run the pipeline, skipping stages whose output exists.
    RunPipeline,
    /// Re-run one stage and replace its output.
    ForceRerun {
        /// The output to recompute.
        key: StageKey,
    },
    /// Export to a destination, or to the default one.
    Export {
        /// Where to write.
        #[serde(default)]
        destination: Option<Destination>,
    },
    /// Drop the document and every output.
    Restart,
}

impl UserSignal {
    /// Returns the snake_case signal name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Upload { .. } => "upload",
            Self::OpenFile { .. } => "open_file",
            Self::PasteText { .. } => "paste_text",
            Self::Confirm => "confirm",
            Self::Decline => "decline",
            Self::RunPipeline => "run_pipeline",
            Self::ForceRerun { .. } => "force_rerun",
            Self::Export { .. } => "export",
            Self::Restart => "restart",
        }
    }
}

/// Body of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadPayload {
    /// Raw file bytes.
    Bytes(Vec<u8>),
    /// Base64 text; saved verbatim if it does not decode.
    Base64(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(CoordinatorState::default(), CoordinatorState::AwaitingFile);
        assert_eq!(
            serde_json::to_value(CoordinatorState::AwaitingExportConfirmation).unwrap(),
            "awaiting_export_confirmation"
        );
        assert_eq!(CoordinatorState::PipelineRunning.to_string(), "pipeline_running");
    }

    #[test]
    fn test_state_gates() {
        assert!(CoordinatorState::AwaitingConfirmation.accepts_document());
        assert!(!CoordinatorState::Done.accepts_document());
        assert!(CoordinatorState::Done.accepts_run());
        assert!(!CoordinatorState::AwaitingFile.accepts_run());
        assert!(!CoordinatorState::PipelineRunning.accepts_run());
    }

    #[test]
    fn test_signal_deserializes_from_tagged_json() {
        let signal: UserSignal =
            serde_json::from_value(serde_json::json!({"signal": "force_rerun", "key": "actors"}))
                .unwrap();
        assert_eq!(signal, UserSignal::ForceRerun { key: StageKey::Actors });

        let export: UserSignal =
            serde_json::from_value(serde_json::json!({"signal": "export"})).unwrap();
        assert_eq!(export, UserSignal::Export { destination: None });
        assert_eq!(export.name(), "export");
    }
}
