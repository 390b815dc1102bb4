//! Run identity for tracking pipeline executions.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies a pipeline run and the session it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIdentity {
    /// The unique ID for this pipeline run.
    pub run_id: Uuid,

    /// The session ID (for session-scoped tracking).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
}

impl RunIdentity {
    /// Creates a new run identity with a generated run ID.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            session_id: None,
        }
    }

    /// Sets the session ID.
    #[must_use]
    pub const fn with_session_id(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self::new()
    }
}
