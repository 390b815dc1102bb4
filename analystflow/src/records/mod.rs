//! Typed stage outputs.
//!
//! [`StageKey`] names each output slot, [`StageValue`] holds one stage's
//! record container and [`StageRecord`] ties each container type to its key
//! so that reads and writes are checked at compile time.

mod models;
pub mod schema;

pub use models::{
    Actor, ActorInteraction, ActorsOutput, DataObject, DataObjectsOutput, UseCase,
    UseCasesOutput, UserRequirement, UserRequirementsOutput,
};
pub use schema::{extract_json, SchemaValidator};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// Identifies one stage output slot in the run state.
///
/// Variant order is the stage declaration order and therefore the order of
/// sections in exported reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKey {
    /// User requirements.
    Requirements,
    /// Actors.
    Actors,
    /// Data objects.
    DataObjects,
    /// Use cases.
    UseCases,
}

impl StageKey {
    /// Every key in declaration order.
    pub const ALL: [Self; 4] = [
        Self::Requirements,
        Self::Actors,
        Self::DataObjects,
        Self::UseCases,
    ];

    /// Returns the snake_case key name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requirements => "requirements",
            Self::Actors => "actors",
            Self::DataObjects => "data_objects",
            Self::UseCases => "use_cases",
        }
    }

    /// Returns the section title used in reports.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::Requirements => "Requirements",
            Self::Actors => "Actors",
            Self::DataObjects => "Data Objects",
            Self::UseCases => "Use Cases",
        }
    }

    /// Parses a key from its snake_case name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == name)
    }
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared stage input: the ingested document or another stage's output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKey {
    /// The raw ingested document text.
    Document,
    /// The output of the stage producing this key.
    Stage(StageKey),
}

impl InputKey {
    /// Returns the key name used in prompts and diagnostics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Document => "document",
            Self::Stage(key) => key.as_str(),
        }
    }
}

impl fmt::Display for InputKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StageKey> for InputKey {
    fn from(key: StageKey) -> Self {
        Self::Stage(key)
    }
}

/// One stage's record container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "output", rename_all = "snake_case")]
pub enum StageValue {
    /// Output of the requirements stage.
    Requirements(UserRequirementsOutput),
    /// Output of the actors stage.
    Actors(ActorsOutput),
    /// Output of the data objects stage.
    DataObjects(DataObjectsOutput),
    /// Output of the use cases stage.
    UseCases(UseCasesOutput),
}

impl StageValue {
    /// Returns the key this value belongs under.
    #[must_use]
    pub const fn key(&self) -> StageKey {
        match self {
            Self::Requirements(_) => StageKey::Requirements,
            Self::Actors(_) => StageKey::Actors,
            Self::DataObjects(_) => StageKey::DataObjects,
            Self::UseCases(_) => StageKey::UseCases,
        }
    }

    /// Returns an empty container for `key`.
    #[must_use]
    pub fn empty(key: StageKey) -> Self {
        match key {
            StageKey::Requirements => Self::Requirements(UserRequirementsOutput::default()),
            StageKey::Actors => Self::Actors(ActorsOutput::default()),
            StageKey::DataObjects => Self::DataObjects(DataObjectsOutput::default()),
            StageKey::UseCases => Self::UseCases(UseCasesOutput::default()),
        }
    }

    /// Returns the number of records in the container.
    #[must_use]
    pub fn record_count(&self) -> usize {
        match self {
            Self::Requirements(v) => v.record_count(),
            Self::Actors(v) => v.record_count(),
            Self::DataObjects(v) => v.record_count(),
            Self::UseCases(v) => v.record_count(),
        }
    }

    /// Returns true when the container holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record_count() == 0
    }

    /// Serializes the bare container (without the stage tag).
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            Self::Requirements(v) => serde_json::to_value(v),
            Self::Actors(v) => serde_json::to_value(v),
            Self::DataObjects(v) => serde_json::to_value(v),
            Self::UseCases(v) => serde_json::to_value(v),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

/// Ties a record container type to its output key.
pub trait StageRecord:
    Serialize + DeserializeOwned + Clone + Send + Sync + fmt::Debug + 'static
{
    /// The output key this container is stored under.
    const KEY: StageKey;

    /// JSON shape description handed to the extraction call.
    const SCHEMA_HINT: &'static str;

    /// Wraps the container in a [`StageValue`].
    fn into_value(self) -> StageValue;

    /// Borrows the container out of a [`StageValue`] of the matching variant.
    fn from_value(value: &StageValue) -> Option<&Self>;

    /// Number of records in the container.
    fn record_count(&self) -> usize;
}

impl StageRecord for UserRequirementsOutput {
    const KEY: StageKey = StageKey::Requirements;
    const SCHEMA_HINT: &'static str = r#"{"requirements": [{"id": string, "name": string, "source": string, "type": string, "detail": string, "covered_usr": string}]}"#;

    fn into_value(self) -> StageValue {
        StageValue::Requirements(self)
    }

    fn from_value(value: &StageValue) -> Option<&Self> {
        match value {
            StageValue::Requirements(v) => Some(v),
            _ => None,
        }
    }

    fn record_count(&self) -> usize {
        self.requirements.len()
    }
}

impl StageRecord for ActorsOutput {
    const KEY: StageKey = StageKey::Actors;
    const SCHEMA_HINT: &'static str = r#"{"actors": [{"id": string, "name": string, "role": string, "responsibilities": [string], "permissions": [string], "interactions": [{"target": string, "interaction_type": string, "description": string}]}], "actor_hierarchy": string (optional), "stakeholder_summary": string (optional)}"#;

    fn into_value(self) -> StageValue {
        StageValue::Actors(self)
    }

    fn from_value(value: &StageValue) -> Option<&Self> {
        match value {
            StageValue::Actors(v) => Some(v),
            _ => None,
        }
    }

    fn record_count(&self) -> usize {
        self.actors.len()
    }
}

impl StageRecord for DataObjectsOutput {
    const KEY: StageKey = StageKey::DataObjects;
    const SCHEMA_HINT: &'static str =
        r#"{"data_objects": [{"id": string, "name": string, "description": string}]}"#;

    fn into_value(self) -> StageValue {
        StageValue::DataObjects(self)
    }

    fn from_value(value: &StageValue) -> Option<&Self> {
        match value {
            StageValue::DataObjects(v) => Some(v),
            _ => None,
        }
    }

    fn record_count(&self) -> usize {
        self.data_objects.len()
    }
}

impl StageRecord for UseCasesOutput {
    const KEY: StageKey = StageKey::UseCases;
    const SCHEMA_HINT: &'static str = r#"{"use_cases": [{"id": string, "name": string, "actors": [string], "description": string, "preconditions": [string], "postconditions": [string]}]}"#;

    fn into_value(self) -> StageValue {
        StageValue::UseCases(self)
    }

    fn from_value(value: &StageValue) -> Option<&Self> {
        match value {
            StageValue::UseCases(v) => Some(v),
            _ => None,
        }
    }

    fn record_count(&self) -> usize {
        self.use_cases.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_in_declaration_order() {
        let names: Vec<_> = StageKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(names, ["requirements", "actors", "data_objects", "use_cases"]);
        assert!(StageKey::Requirements < StageKey::UseCases);
    }

    #[test]
    fn test_key_parse() {
        assert_eq!(StageKey::parse("data_objects"), Some(StageKey::DataObjects));
        assert_eq!(StageKey::parse("ur_agent_output"), None);
    }

    #[test]
    fn test_value_key_and_count() {
        let value = DataObjectsOutput {
            data_objects: vec![DataObject {
                id: "DO-1".to_string(),
                name: "Order".to_string(),
                description: "A customer order".to_string(),
            }],
        }
        .into_value();

        assert_eq!(value.key(), StageKey::DataObjects);
        assert_eq!(value.record_count(), 1);
        assert!(!value.is_empty());
        assert!(DataObjectsOutput::from_value(&value).is_some());
        assert!(ActorsOutput::from_value(&value).is_none());
    }

    #[test]
    fn test_requirement_type_field_is_renamed() {
        let req = UserRequirement {
            id: "UR-1".to_string(),
            name: "Login".to_string(),
            source: "Section 2".to_string(),
            requirement_type: "functional".to_string(),
            detail: "Users log in with email".to_string(),
            covered_usr: "USR-1".to_string(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "functional");
        assert!(json.get("requirement_type").is_none());
    }

    #[test]
    fn test_to_json_is_bare_container() {
        let value = UseCasesOutput::default().into_value();
        assert_eq!(value.to_json(), serde_json::json!({"use_cases": []}));
        assert!(value.is_empty());
    }
}
