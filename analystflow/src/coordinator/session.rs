//! Sessions and the registry that owns them.

use super::{Coordinator, CoordinatorHandle, CoordinatorState, UserSignal};
use crate::context::RunState;
use crate::tools::ToolResult;
use crate::utils::{now, Timestamp};
use dashmap::DashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// One user's analysis session.
///
/// Signals are handled one at a time; state reads and cancellation do not
/// wait for the signal in flight.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: Timestamp,
    handle: CoordinatorHandle,
    run_state: Arc<RunState>,
    coordinator: Mutex<Coordinator>,
}

impl Session {
    /// Wraps a coordinator.
    #[must_use]
    pub fn new(coordinator: Coordinator) -> Self {
        Self {
            id: coordinator.session_id(),
            created_at: now(),
            handle: coordinator.handle(),
            run_state: Arc::clone(coordinator.run_state()),
            coordinator: Mutex::new(coordinator),
        }
    }

    /// Returns the session ID.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns when the session was created.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the coordinator state.
    #[must_use]
    pub fn state(&self) -> CoordinatorState {
        self.handle.state()
    }

    /// Returns the session's run state.
    #[must_use]
    pub const fn run_state(&self) -> &Arc<RunState> {
        &self.run_state
    }

    /// Handles a signal, waiting for any earlier one to finish.
    pub async fn handle(&self, signal: UserSignal) -> ToolResult {
        self.coordinator.lock().await.handle_signal(signal).await
    }

    /// Cancels the in-flight pipeline run, if any.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        self.handle.cancel(reason)
    }
}

type CoordinatorFactory = dyn Fn(Uuid, PathBuf) -> Coordinator + Send + Sync;

/// Concurrent map of live sessions.
///
/// Each session gets its own working directory under the registry's base
/// directory and its own run state.
pub struct SessionRegistry {
    base_dir: PathBuf,
    factory: Arc<CoordinatorFactory>,
    sessions: DashMap<Uuid, Arc<Session>>,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("base_dir", &self.base_dir)
            .field("sessions", &self.sessions.len())
            .finish_non_exhaustive()
    }
}

impl SessionRegistry {
    /// Creates a registry. `factory` builds the coordinator for a new
    /// session from its ID and working directory.
    #[must_use]
    pub fn new<F>(base_dir: impl Into<PathBuf>, factory: F) -> Self
    where
        F: Fn(Uuid, PathBuf) -> Coordinator + Send + Sync + 'static,
    {
        Self {
            base_dir: base_dir.into(),
            factory: Arc::new(factory),
            sessions: DashMap::new(),
        }
    }

    /// Starts a new session.
    pub fn create(&self) -> Arc<Session> {
        let id = Uuid::new_v4();
        let working_dir = self.base_dir.join(id.to_string());
        let coordinator = (self.factory)(id, working_dir).with_session_id(id);
        let session = Arc::new(Session::new(coordinator));
        self.sessions.insert(id, Arc::clone(&session));
        info!(session_id = %id, "Session created");
        session
    }

    /// Returns a session by ID.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Ends a session, cancelling its run.
    pub fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(&id)?;
        session.cancel("Session closed");
        info!(session_id = %id, "Session removed");
        Some(session)
    }

    /// Returns the live session IDs.
    #[must_use]
    pub fn ids(&self) -> Vec<Uuid> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Returns the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Returns true if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
