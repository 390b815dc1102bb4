//! Sample records and contexts for tests.

use std::sync::Arc;

use crate::context::{PipelineContext, RunIdentity, RunState, SourceDocument};
use crate::events::CollectingEventSink;
use crate::records::{
    Actor, ActorInteraction, ActorsOutput, DataObject, DataObjectsOutput, StageRecord, StageValue,
    UseCase, UseCasesOutput, UserRequirement, UserRequirementsOutput,
};

/// A short requirements document.
pub const SAMPLE_DOCUMENT: &str = "The library system lets members borrow books. \
Librarians register new books and approve loan extensions. \
Members receive a reminder two days before a loan is due.";

/// Returns the sample source document.
#[must_use]
pub fn document() -> SourceDocument {
    SourceDocument::new("library.txt", SAMPLE_DOCUMENT)
}

/// Returns two sample requirements.
#[must_use]
pub fn requirements() -> UserRequirementsOutput {
    UserRequirementsOutput {
        requirements: vec![
            UserRequirement {
                id: "UR-1".to_string(),
                name: "Borrow books".to_string(),
                source: "Paragraph 1".to_string(),
                requirement_type: "functional".to_string(),
                detail: "Members can borrow books from the library.".to_string(),
                covered_usr: "US-1".to_string(),
            },
            UserRequirement {
                id: "UR-2".to_string(),
                name: "Due-date reminder".to_string(),
                source: "Paragraph 1".to_string(),
                requirement_type: "functional".to_string(),
                detail: "Members are reminded two days before a loan is due.".to_string(),
                covered_usr: "US-2".to_string(),
            },
        ],
    }
}

/// Returns two sample actors.
#[must_use]
pub fn actors() -> ActorsOutput {
    ActorsOutput {
        actors: vec![
            Actor {
                id: "A-1".to_string(),
                name: "Member".to_string(),
                role: "Borrows books".to_string(),
                responsibilities: vec!["Return books on time".to_string()],
                permissions: vec!["Borrow books".to_string()],
                interactions: vec![ActorInteraction {
                    target: "Librarian".to_string(),
                    interaction_type: "requests".to_string(),
                    description: "Asks for a loan extension".to_string(),
                }],
            },
            Actor {
                id: "A-2".to_string(),
                name: "Librarian".to_string(),
                role: "Manages the catalogue".to_string(),
                responsibilities: vec!["Register books".to_string()],
                permissions: vec!["Approve extensions".to_string()],
                interactions: Vec::new(),
            },
        ],
        actor_hierarchy: Some("Librarians supervise member loans.".to_string()),
        stakeholder_summary: None,
    }
}

/// Returns two sample data objects.
#[must_use]
pub fn data_objects() -> DataObjectsOutput {
    DataObjectsOutput {
        data_objects: vec![
            DataObject {
                id: "DO-1".to_string(),
                name: "Book".to_string(),
                description: "A catalogued title".to_string(),
            },
            DataObject {
                id: "DO-2".to_string(),
                name: "Loan".to_string(),
                description: "A book lent to a member".to_string(),
            },
        ],
    }
}

/// Returns one sample use case.
#[must_use]
pub fn use_cases() -> UseCasesOutput {
    UseCasesOutput {
        use_cases: vec![UseCase {
            id: "UC-1".to_string(),
            name: "Borrow a book".to_string(),
            actors: vec!["Member".to_string(), "Librarian".to_string()],
            description: "A member borrows an available book.".to_string(),
            preconditions: vec!["The member is registered".to_string()],
            postconditions: vec!["A loan exists".to_string()],
        }],
    }
}

/// Returns [`requirements`] as a stage value.
#[must_use]
pub fn requirements_value() -> StageValue {
    requirements().into_value()
}

/// Returns [`actors`] as a stage value.
#[must_use]
pub fn actors_value() -> StageValue {
    actors().into_value()
}

/// Returns [`data_objects`] as a stage value.
#[must_use]
pub fn data_objects_value() -> StageValue {
    data_objects().into_value()
}

/// Returns [`use_cases`] as a stage value.
#[must_use]
pub fn use_cases_value() -> StageValue {
    use_cases().into_value()
}

/// Returns a run state holding the sample document.
#[must_use]
pub fn state_with_document() -> Arc<RunState> {
    let state = Arc::new(RunState::new());
    state.set_document(document());
    state
}

/// Returns a run state holding the document and all four outputs.
#[must_use]
pub fn complete_state() -> Arc<RunState> {
    let state = state_with_document();
    for value in [
        requirements_value(),
        actors_value(),
        data_objects_value(),
        use_cases_value(),
    ] {
        state.replace(value);
    }
    state
}

/// Builds a pipeline context over `state` that records every event.
#[must_use]
pub fn recording_context(state: Arc<RunState>) -> (Arc<PipelineContext>, Arc<CollectingEventSink>) {
    let sink = Arc::new(CollectingEventSink::new());
    let ctx = PipelineContext::new(RunIdentity::new(), state).with_event_sink(sink.clone());
    (Arc::new(ctx), sink)
}
