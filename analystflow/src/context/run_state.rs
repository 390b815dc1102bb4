//! Session-scoped store of the ingested document and stage outputs.

use crate::errors::OutputConflictError;
use crate::records::{StageKey, StageRecord, StageValue};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// The document text handed to stages that declare the document input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Path or other identifier of the source.
    pub identifier: String,
    /// Extracted text, or an explicit "no content" marker.
    pub text: String,
}

impl SourceDocument {
    /// Creates a new source document.
    #[must_use]
    pub fn new(identifier: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            text: text.into(),
        }
    }
}

/// The shared, typed run state of one session.
///
/// Holds at most one value per [`StageKey`]. A populated key is never
/// overwritten by [`RunState::set`]; only a forced re-run goes through
/// [`RunState::replace`]. Readers always observe whole values because every
/// write swaps the entry under a lock.
#[derive(Debug, Default)]
pub struct RunState {
    document: RwLock<Option<SourceDocument>>,
    outputs: RwLock<HashMap<StageKey, StageValue>>,
    guards: DashMap<StageKey, Arc<Mutex<()>>>,
}

impl RunState {
    /// Creates an empty run state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the ingested document, replacing any earlier one.
    pub fn set_document(&self, document: SourceDocument) {
        *self.document.write() = Some(document);
    }

    /// Returns the ingested document, if any.
    #[must_use]
    pub fn document(&self) -> Option<SourceDocument> {
        self.document.read().clone()
    }

    /// Returns true once a document has been ingested.
    #[must_use]
    pub fn has_document(&self) -> bool {
        self.document.read().is_some()
    }

    /// Gets the value stored under a key.
    #[must_use]
    pub fn get(&self, key: StageKey) -> Option<StageValue> {
        self.outputs.read().get(&key).cloned()
    }

    /// Gets the typed container for `T`.
    #[must_use]
    pub fn get_typed<T: StageRecord>(&self) -> Option<T> {
        self.outputs
            .read()
            .get(&T::KEY)
            .and_then(T::from_value)
            .cloned()
    }

    /// Returns true if any value is stored under the key.
    #[must_use]
    pub fn contains(&self, key: StageKey) -> bool {
        self.outputs.read().contains_key(&key)
    }

    /// Returns true if the key holds a value with at least one record.
    #[must_use]
    pub fn is_populated(&self, key: StageKey) -> bool {
        self.outputs
            .read()
            .get(&key)
            .is_some_and(|value| !value.is_empty())
    }

    /// Stores a stage value under its own key.
    ///
    /// An empty value may be replaced; a populated one may not.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the key is already populated.
    pub fn set(&self, value: StageValue) -> Result<(), OutputConflictError> {
        let key = value.key();
        let mut outputs = self.outputs.write();

        if outputs.get(&key).is_some_and(|existing| !existing.is_empty()) {
            return Err(OutputConflictError::new(key.as_str()));
        }

        outputs.insert(key, value);
        Ok(())
    }

    /// Stores a typed container under its key.
    ///
    /// # Errors
    ///
    /// Returns `OutputConflictError` if the key is already populated.
    pub fn set_typed<T: StageRecord>(&self, record: T) -> Result<(), OutputConflictError> {
        self.set(record.into_value())
    }

    /// Replaces the value under its key, returning the previous one.
    ///
    /// Only forced re-runs use this.
    pub fn replace(&self, value: StageValue) -> Option<StageValue> {
        self.outputs.write().insert(value.key(), value)
    }

    /// Returns every stored value in stage declaration order.
    #[must_use]
    pub fn export(&self) -> Vec<StageValue> {
        self.export_subset(&StageKey::ALL)
    }

    /// Returns the stored values for `keys`, in stage declaration order.
    #[must_use]
    pub fn export_subset(&self, keys: &[StageKey]) -> Vec<StageValue> {
        let outputs = self.outputs.read();
        StageKey::ALL
            .into_iter()
            .filter(|key| keys.contains(key))
            .filter_map(|key| outputs.get(&key).cloned())
            .collect()
    }

    /// Returns the keys from `keys` that hold no value.
    #[must_use]
    pub fn missing(&self, keys: &[StageKey]) -> Vec<StageKey> {
        let outputs = self.outputs.read();
        keys.iter()
            .copied()
            .filter(|key| !outputs.contains_key(key))
            .collect()
    }

    /// Returns the guard serializing check-execute-write for one stage.
    #[must_use]
    pub fn stage_guard(&self, key: StageKey) -> Arc<Mutex<()>> {
        self.guards.entry(key).or_default().clone()
    }

    /// Returns the number of stored outputs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outputs.read().len()
    }

    /// Returns true if no outputs are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outputs.read().is_empty()
    }

    /// Drops the document and every output.
    pub fn clear(&self) {
        *self.document.write() = None;
        self.outputs.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::records::{ActorsOutput, UserRequirementsOutput};

    #[test]
    fn test_set_then_get() {
        let state = RunState::new();
        state.set(fixtures::requirements_value()).unwrap();

        assert!(state.contains(StageKey::Requirements));
        assert!(state.is_populated(StageKey::Requirements));
        assert_eq!(
            state.get_typed::<UserRequirementsOutput>().unwrap().requirements.len(),
            fixtures::requirements().requirements.len()
        );
        assert!(state.get_typed::<ActorsOutput>().is_none());
    }

    #[test]
    fn test_populated_key_is_never_overwritten() {
        let state = RunState::new();
        state.set(fixtures::requirements_value()).unwrap();

        let err = state
            .set_typed(UserRequirementsOutput::default())
            .unwrap_err();
        assert_eq!(err.key, "requirements");
        assert!(state.is_populated(StageKey::Requirements));
    }

    #[test]
    fn test_empty_value_may_be_replaced() {
        let state = RunState::new();
        state.set_typed(UserRequirementsOutput::default()).unwrap();
        assert!(state.contains(StageKey::Requirements));
        assert!(!state.is_populated(StageKey::Requirements));

        state.set(fixtures::requirements_value()).unwrap();
        assert!(state.is_populated(StageKey::Requirements));
    }

    #[test]
    fn test_replace_returns_previous() {
        let state = RunState::new();
        state.set(fixtures::actors_value()).unwrap();

        let previous = state.replace(ActorsOutput::default().into_value());
        assert_eq!(previous, Some(fixtures::actors_value()));
        assert!(!state.is_populated(StageKey::Actors));
    }

    #[test]
    fn test_export_follows_declaration_order() {
        let state = RunState::new();
        state.set(fixtures::use_cases_value()).unwrap();
        state.set(fixtures::data_objects_value()).unwrap();
        state.set(fixtures::requirements_value()).unwrap();

        let keys: Vec<_> = state.export().iter().map(StageValue::key).collect();
        assert_eq!(
            keys,
            [StageKey::Requirements, StageKey::DataObjects, StageKey::UseCases]
        );
        assert_eq!(state.missing(&StageKey::ALL), [StageKey::Actors]);
    }

    #[test]
    fn test_clear_resets_everything() {
        let state = RunState::new();
        state.set_document(SourceDocument::new("a.txt", "hello"));
        state.set(fixtures::requirements_value()).unwrap();

        state.clear();
        assert!(!state.has_document());
        assert!(state.is_empty());
    }

    #[tokio::test]
    async fn test_stage_guard_is_shared_per_key() {
        let state = RunState::new();
        let first = state.stage_guard(StageKey::Actors);
        let second = state.stage_guard(StageKey::Actors);
        assert!(Arc::ptr_eq(&first, &second));

        let _held = first.lock().await;
        assert!(second.try_lock().is_err());
        assert!(state.stage_guard(StageKey::UseCases).try_lock().is_ok());
    }
}
