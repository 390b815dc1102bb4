//! Record schemas produced by the analysis stages.
//!
//! Every container rejects unknown fields so that an extraction response
//! with extra keys is reported as a schema violation rather than silently
//! trimmed.

use serde::{Deserialize, Serialize};

/// One user requirement lifted from the source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRequirement {
    /// Requirement identifier, e.g. `UR-1`.
    pub id: String,
    /// Short requirement name.
    pub name: String,
    /// Where in the document the requirement came from.
    pub source: String,
    /// Requirement category (functional, non-functional, ...).
    #[serde(rename = "type")]
    pub requirement_type: String,
    /// Full requirement text.
    pub detail: String,
    /// Identifiers of the user stories this requirement covers.
    pub covered_usr: String,
}

/// Stage output of the requirements stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserRequirementsOutput {
    /// Extracted requirements.
    pub requirements: Vec<UserRequirement>,
}

/// A directed interaction from one actor to another party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorInteraction {
    /// The actor or system on the receiving end.
    pub target: String,
    /// Kind of interaction (uses, approves, notifies, ...).
    pub interaction_type: String,
    /// What happens in the interaction.
    pub description: String,
}

/// An actor taking part in the described system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Actor {
    /// Actor identifier.
    pub id: String,
    /// Actor name.
    pub name: String,
    /// Role description.
    pub role: String,
    /// What the actor is responsible for.
    pub responsibilities: Vec<String>,
    /// What the actor may do.
    pub permissions: Vec<String>,
    /// Interactions with other actors or systems.
    pub interactions: Vec<ActorInteraction>,
}

/// Stage output of the actors stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActorsOutput {
    /// Identified actors.
    pub actors: Vec<Actor>,
    /// Free-text description of how actors relate hierarchically.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_hierarchy: Option<String>,
    /// Free-text summary of the stakeholders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholder_summary: Option<String>,
}

/// A business data object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataObject {
    /// Data object identifier.
    pub id: String,
    /// Data object name.
    pub name: String,
    /// What the object represents.
    pub description: String,
}

/// Stage output of the data objects stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DataObjectsOutput {
    /// Identified data objects.
    pub data_objects: Vec<DataObject>,
}

/// A use case synthesised from requirements, actors and data objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseCase {
    /// Use case identifier.
    pub id: String,
    /// Use case name.
    pub name: String,
    /// Names of the participating actors.
    pub actors: Vec<String>,
    /// Main flow description.
    pub description: String,
    /// Conditions that hold before the use case starts.
    pub preconditions: Vec<String>,
    /// Conditions that hold after it completes.
    pub postconditions: Vec<String>,
}

/// Stage output of the use cases stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UseCasesOutput {
    /// Synthesised use cases.
    pub use_cases: Vec<UseCase>,
}
