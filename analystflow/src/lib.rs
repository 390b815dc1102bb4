//! # Analystflow
//!
//! Orchestration engine for a multi-agent business-analysis assistant.
//!
//! A document is ingested, then four model-backed stages extract user
//! requirements, actors, data objects and use cases from it:
//!
//! - **Stage graph**: requirements first, actors and data objects
//!   concurrently, use cases once both are done
//! - **Run state**: one typed slot per stage output; populated slots are
//!   reused, never recomputed
//! - **Ingestion**: PDF, Markdown and text with encoding fallback
//! - **Export**: Markdown reports to a local directory or a bucket
//! - **Coordinator**: the state machine that drives a session from upload to
//!   export
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use analystflow::prelude::*;
//!
//! let graph = business_analysis_graph(llm, &config.models)?;
//! let mut coordinator = Coordinator::new(Arc::new(graph), "assets/input");
//!
//! coordinator.handle_signal(UserSignal::OpenFile { path: "brief.pdf".into() }).await;
//! coordinator.handle_signal(UserSignal::Confirm).await;
//! let result = coordinator.handle_signal(UserSignal::RunPipeline).await;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod core;
pub mod errors;
pub mod events;
pub mod export;
pub mod ingestion;
pub mod llm;
pub mod observability;
pub mod pipeline;
pub mod records;
pub mod stages;
pub mod testing;
pub mod tools;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::AppConfig;
    pub use crate::context::{
        PipelineContext, RunIdentity, RunState, SourceDocument, StageContext, StageInputs,
    };
    pub use crate::coordinator::{
        Coordinator, CoordinatorState, Session, SessionRegistry, UploadPayload, UserSignal,
    };
    pub use crate::core::{StageOutput, StageStatus};
    pub use crate::errors::{AnalystflowError, ErrorKind, StageError};
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink, PipelineEvent};
    pub use crate::export::{Destination, ReportExporter, ReportWriter};
    pub use crate::ingestion::{DocumentArtifact, DocumentIngestor};
    pub use crate::llm::{CompletionRequest, LlmClient};
    pub use crate::pipeline::{
        business_analysis_graph, PipelineBuilder, RunOptions, RunReport, SkipPolicy,
        StageGraph, StageSpec,
    };
    pub use crate::records::{
        ActorsOutput, DataObjectsOutput, StageKey, StageRecord, StageValue, UseCasesOutput,
        UserRequirementsOutput,
    };
    pub use crate::stages::Stage;
    pub use crate::tools::ToolResult;
    pub use crate::utils::Timestamp;
}
