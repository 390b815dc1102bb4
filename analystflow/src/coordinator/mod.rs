//! The policy layer between the user and the pipeline.
//!
//! A [`Coordinator`] is a finite state machine over [`CoordinatorState`].
//! Each [`UserSignal`] either moves it forward or is refused with an
//! `invalid_state` result; every answer is a [`ToolResult`]. The coordinator
//! never schedules stages itself: it hands the run state to the stage graph,
//! which skips populated outputs, and it never calls the exporter before all
//! four outputs exist.

mod session;
mod state;

pub use session::{Session, SessionRegistry};
pub use state::{CoordinatorState, UploadPayload, UserSignal};

use crate::cancellation::CancellationToken;
use crate::config::AppConfig;
use crate::context::{PipelineContext, RunIdentity, RunState, SourceDocument, DEFAULT_STAGE_TIMEOUT};
use crate::errors::{AnalystflowError, ErrorKind, IngestionError};
use crate::events::{EventSink, LoggingEventSink};
use crate::export::{Destination, ReportExporter, ReportWriter};
use crate::ingestion::{DocumentArtifact, DocumentIngestor, EMPTY_FILE_MARKER};
use crate::llm::LlmClient;
use crate::pipeline::{business_analysis_graph, RunOptions, RunReport, SkipPolicy, StageGraph};
use crate::records::StageKey;
use crate::tools::ToolResult;
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

/// Identifier used for pasted text.
pub const PASTED_TEXT_IDENTIFIER: &str = "pasted_text";

/// A document ingested but not yet confirmed.
#[derive(Debug, Clone)]
struct PendingDocument {
    document: SourceDocument,
    is_empty: bool,
}

/// Shared view of a coordinator used while it is busy.
///
/// Lets another task read the state or cancel the in-flight run without
/// waiting for the coordinator itself.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorHandle {
    state: Arc<RwLock<CoordinatorState>>,
    active_run: Arc<Mutex<Option<Arc<CancellationToken>>>>,
}

impl CoordinatorHandle {
    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        *self.state.read()
    }

    /// Cancels the in-flight run. Returns false if none is running.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        match self.active_run.lock().as_ref() {
            Some(token) => {
                token.cancel(reason);
                true
            }
            None => false,
        }
    }

    fn set(&self, state: CoordinatorState) {
        *self.state.write() = state;
    }
}

/// Drives one session through ingestion, analysis and export.
pub struct Coordinator {
    session_id: Uuid,
    handle: CoordinatorHandle,
    run_state: Arc<RunState>,
    graph: Arc<StageGraph>,
    ingestor: DocumentIngestor,
    exporter: ReportExporter,
    working_dir: PathBuf,
    default_destination: Destination,
    skip_policy: SkipPolicy,
    stage_timeout: Duration,
    event_sink: Arc<dyn EventSink>,
    pending: Option<PendingDocument>,
    last_report: Option<RunReport>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("session_id", &self.session_id)
            .field("state", &self.state())
            .field("pipeline", &self.graph.name())
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Creates a coordinator over `graph`, saving uploads under `working_dir`.
    ///
    /// Reports go to `working_dir` unless another default destination is set.
    #[must_use]
    pub fn new(graph: Arc<StageGraph>, working_dir: impl Into<PathBuf>) -> Self {
        let working_dir = working_dir.into();
        Self {
            session_id: Uuid::new_v4(),
            handle: CoordinatorHandle::default(),
            run_state: Arc::new(RunState::new()),
            graph,
            ingestor: DocumentIngestor::new(crate::config::IngestionConfig::default()),
            exporter: ReportExporter::default(),
            default_destination: Destination::local(&working_dir),
            working_dir,
            skip_policy: SkipPolicy::default(),
            stage_timeout: DEFAULT_STAGE_TIMEOUT,
            event_sink: Arc::new(LoggingEventSink::debug()),
            pending: None,
            last_report: None,
        }
    }

    /// Builds a coordinator for the standard model-backed pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the graph fails validation.
    pub fn from_config(
        config: &AppConfig,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, AnalystflowError> {
        let graph = business_analysis_graph(llm, &config.models)?;
        Ok(Self::new(Arc::new(graph), &config.paths.working_dir)
            .with_ingestor(DocumentIngestor::new(config.ingestion.clone()))
            .with_exporter(ReportExporter::new(ReportWriter::new()).with_stems(config.output_keys.clone()))
            .with_default_destination(Destination::local(&config.paths.output_dir))
            .with_skip_policy(config.pipeline.skip_policy)
            .with_stage_timeout(config.pipeline.stage_timeout()))
    }

    /// Sets the session ID.
    #[must_use]
    pub const fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = session_id;
        self
    }

    /// Uses an existing run state.
    #[must_use]
    pub fn with_run_state(mut self, run_state: Arc<RunState>) -> Self {
        self.run_state = run_state;
        self
    }

    /// Sets the document ingestor.
    #[must_use]
    pub fn with_ingestor(mut self, ingestor: DocumentIngestor) -> Self {
        self.ingestor = ingestor;
        self
    }

    /// Sets the report exporter.
    #[must_use]
    pub fn with_exporter(mut self, exporter: ReportExporter) -> Self {
        self.exporter = exporter;
        self
    }

    /// Sets where `Confirm` and destination-less `Export` write.
    #[must_use]
    pub fn with_default_destination(mut self, destination: Destination) -> Self {
        self.default_destination = destination;
        self
    }

    /// Sets the skip policy for pipeline runs.
    #[must_use]
    pub const fn with_skip_policy(mut self, policy: SkipPolicy) -> Self {
        self.skip_policy = policy;
        self
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub const fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    /// Sets the event sink for pipeline runs.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Returns the session ID.
    #[must_use]
    pub const fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.handle.state()
    }

    /// Returns a handle for observing or cancelling from another task.
    #[must_use]
    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    /// Returns the run state.
    #[must_use]
    pub const fn run_state(&self) -> &Arc<RunState> {
        &self.run_state
    }

    /// Returns the working directory.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Returns the report of the latest pipeline run.
    #[must_use]
    pub const fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// Returns the output keys that still hold no value.
    #[must_use]
    pub fn missing_outputs(&self) -> Vec<StageKey> {
        self.run_state.missing(&StageKey::ALL)
    }

    /// Handles one user signal.
    pub async fn handle_signal(&mut self, signal: UserSignal) -> ToolResult {
        let from = self.state();
        let name = signal.name();

        let result = match signal {
            UserSignal::Restart => self.restart(),
            UserSignal::Export { destination } => {
                let destination = destination.unwrap_or_else(|| self.default_destination.clone());
                self.export(&destination).await
            }
            UserSignal::Upload { payload, mime } if from.accepts_document() => {
                self.upload(payload, &mime).await
            }
            UserSignal::OpenFile { path } if from.accepts_document() => self.open(&path).await,
            UserSignal::PasteText { text } if from.accepts_document() => self.paste(&text),
            UserSignal::Confirm if from == CoordinatorState::AwaitingConfirmation => {
                self.confirm_document()
            }
            UserSignal::Decline if from == CoordinatorState::AwaitingConfirmation => {
                self.pending = None;
                self.handle.set(CoordinatorState::AwaitingFile);
                ToolResult::success("Document discarded. Please provide another file.")
            }
            UserSignal::RunPipeline if from.accepts_run() => {
                self.run_pipeline(RunOptions::new().with_skip_policy(self.skip_policy))
                    .await
            }
            UserSignal::ForceRerun { key } if from.accepts_run() => {
                self.run_pipeline(
                    RunOptions::new()
                        .with_skip_policy(self.skip_policy)
                        .force(key),
                )
                .await
            }
            UserSignal::Confirm if from == CoordinatorState::AwaitingExportConfirmation => {
                let destination = self.default_destination.clone();
                self.export(&destination).await
            }
            UserSignal::Decline if from == CoordinatorState::AwaitingExportConfirmation => {
                self.handle.set(CoordinatorState::Done);
                ToolResult::success("Export skipped.")
            }
            _ => ToolResult::error(
                ErrorKind::InvalidState,
                format!("Cannot handle '{name}' while {from}"),
            )
            .with_detail(json!({ "state": from, "signal": name })),
        };

        let to = self.state();
        if from != to {
            info!(session_id = %self.session_id, %from, %to, signal = name, "Coordinator transition");
        }
        result
    }

    fn restart(&mut self) -> ToolResult {
        self.handle.cancel("Session restarted");
        self.run_state.clear();
        self.pending = None;
        self.last_report = None;
        self.handle.set(CoordinatorState::AwaitingFile);
        ToolResult::success("Session cleared. Please provide a document.")
    }

    async fn upload(&mut self, payload: UploadPayload, mime: &str) -> ToolResult {
        let saved = match payload {
            UploadPayload::Bytes(bytes) => self.ingestor.save(&self.working_dir, &bytes, mime).await,
            UploadPayload::Base64(text) => {
                self.ingestor
                    .save_base64(&self.working_dir, &text, mime)
                    .await
            }
        };
        match saved {
            Ok(handle) => self.open(&handle.path).await,
            Err(err) => ToolResult::from(&err),
        }
    }

    async fn open(&mut self, path: &Path) -> ToolResult {
        match self.ingestor.read(path).await {
            Ok(artifact) => self.stage_artifact(&artifact),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Ingestion failed");
                ToolResult::from(&err)
            }
        }
    }

    fn stage_artifact(&mut self, artifact: &DocumentArtifact) -> ToolResult {
        let detail = json!({
            "path": artifact.path.display().to_string(),
            "name": artifact.name(),
            "type": artifact.doc_type,
            "size_bytes": artifact.size_bytes,
            "sha256": artifact.sha256,
            "encoding": artifact.encoding,
            "preview": self.ingestor.preview(&artifact.text),
        });
        let document = SourceDocument::new(artifact.path.display().to_string(), artifact.text.clone());
        self.hold(document, artifact.empty_warning(), detail)
    }

    fn paste(&mut self, text: &str) -> ToolResult {
        let is_empty = text.trim().is_empty();
        let body = if is_empty { EMPTY_FILE_MARKER } else { text };
        let warning = is_empty.then(|| IngestionError::Empty {
            path: PathBuf::from(PASTED_TEXT_IDENTIFIER),
        });
        let detail = json!({
            "name": PASTED_TEXT_IDENTIFIER,
            "size_bytes": text.len(),
            "preview": self.ingestor.preview(body),
        });
        self.hold(SourceDocument::new(PASTED_TEXT_IDENTIFIER, body), warning, detail)
    }

    fn hold(
        &mut self,
        document: SourceDocument,
        warning: Option<IngestionError>,
        detail: serde_json::Value,
    ) -> ToolResult {
        self.pending = Some(PendingDocument {
            document,
            is_empty: warning.is_some(),
        });
        self.handle.set(CoordinatorState::AwaitingConfirmation);

        match warning {
            Some(err) => ToolResult::from(&err).with_detail(detail),
            None => ToolResult::success("Document read. Confirm to start the analysis.")
                .with_detail(detail),
        }
    }

    fn confirm_document(&mut self) -> ToolResult {
        let Some(pending) = self.pending.take() else {
            self.handle.set(CoordinatorState::AwaitingFile);
            return ToolResult::error(ErrorKind::InvalidState, "No document is waiting for confirmation");
        };

        let identifier = pending.document.identifier.clone();
        self.run_state.set_document(pending.document);
        self.handle.set(CoordinatorState::ReadyToRunPipeline);

        let result = if pending.is_empty {
            ToolResult::warning(ErrorKind::Empty, "Document has no content; the analysis will see an empty marker.")
        } else {
            ToolResult::success("Document accepted. Ready to run the analysis.")
        };
        result.with_detail(json!({ "document": identifier }))
    }

    async fn run_pipeline(&mut self, options: RunOptions) -> ToolResult {
        if !self.run_state.has_document() {
            self.handle.set(CoordinatorState::AwaitingFile);
            return ToolResult::error(ErrorKind::MissingDependency, "No document in the session");
        }

        let token = Arc::new(CancellationToken::new());
        *self.handle.active_run.lock() = Some(Arc::clone(&token));
        self.handle.set(CoordinatorState::PipelineRunning);

        let ctx = Arc::new(
            PipelineContext::new(
                RunIdentity::new().with_session_id(self.session_id),
                Arc::clone(&self.run_state),
            )
            .with_event_sink(Arc::clone(&self.event_sink))
            .with_cancellation(token)
            .with_stage_timeout(self.stage_timeout),
        );
        let outcome = self.graph.run(&ctx, &options).await;
        *self.handle.active_run.lock() = None;

        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                warn!(session_id = %self.session_id, error = %err, "Pipeline run aborted");
                self.handle.set(CoordinatorState::ReadyToRunPipeline);
                return ToolResult::from(err);
            }
        };

        let missing = self.missing_outputs();
        let detail = run_detail(&report, &missing);
        let result = if report.is_complete() && missing.is_empty() {
            self.handle.set(CoordinatorState::AwaitingExportConfirmation);
            ToolResult::success("Analysis complete. Confirm to export the reports.").with_detail(detail)
        } else {
            self.handle.set(CoordinatorState::ReadyToRunPipeline);
            let kind = if report.cancelled().is_empty() {
                report
                    .stages
                    .iter()
                    .find_map(|stage| stage.output.error_kind())
                    .unwrap_or(ErrorKind::ExecutionError)
            } else {
                ErrorKind::Cancelled
            };
            ToolResult::error(kind, format!("Analysis incomplete.\n{}", report.summary()))
                .with_detail(detail)
        };
        self.last_report = Some(report);
        result
    }

    async fn export(&mut self, destination: &Destination) -> ToolResult {
        if self.state() == CoordinatorState::PipelineRunning {
            return ToolResult::error(ErrorKind::InvalidState, "A pipeline run is in progress");
        }

        match self.exporter.export(&self.run_state, destination).await {
            Ok(summary) => {
                self.handle.set(CoordinatorState::Done);
                ToolResult::success(format!(
                    "Exported {} report(s) to {destination}",
                    summary.files.len()
                ))
                .with_detail(serde_json::to_value(&summary).unwrap_or_default())
            }
            Err(err) => {
                warn!(%destination, error = %err, "Export failed");
                ToolResult::from(&err)
            }
        }
    }
}

fn run_detail(report: &RunReport, missing: &[StageKey]) -> serde_json::Value {
    let failed: Vec<_> = report
        .stages
        .iter()
        .filter_map(|stage| {
            stage.output.error.as_ref().map(|err| {
                json!({ "stage": stage.name, "kind": err.kind(), "message": err.detail() })
            })
        })
        .collect();

    json!({
        "run_id": report.run_id,
        "completed": report.completed(),
        "skipped": report.skipped(),
        "failed": failed,
        "blocked": report.blocked(),
        "cancelled": report.cancelled(),
        "missing": missing,
        "duration_ms": report.duration_ms,
    })
}
