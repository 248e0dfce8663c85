mod activity;

pub use activity::{
    ActivityDocument, ActivityKind, ActorDefinition, ArtifactDefinitionDocument, SequenceFlow,
};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The complete Procflow DSL document.
/// This is the top-level structure of one process definition source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    /// The DSL version (e.g., "1.0")
    pub dsl_version: String,

    /// The process described by this document
    pub process: ProcessDocument,
}

/// A complete process definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDocument {
    /// Human-readable name of the process
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Optional version label
    #[serde(default)]
    pub version: Option<String>,

    /// Disabled processes are still loadable but should not get new instances
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Id of the start activity. Defaults to the single `start` activity.
    #[serde(default)]
    pub start_activity: Option<String>,

    /// Roles that may be assigned to activities
    #[serde(default)]
    pub actors: Vec<ActorDefinition>,

    /// Every activity of the process
    #[serde(default)]
    pub activities: Vec<ActivityDocument>,

    /// Optional metadata (arbitrary key-value pairs)
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

impl ProcessDocument {
    /// Find an activity by id
    pub fn activity(&self, id: &str) -> Option<&ActivityDocument> {
        self.activities.iter().find(|activity| activity.id == id)
    }

    /// Find an actor by id
    pub fn actor(&self, id: &str) -> Option<&ActorDefinition> {
        self.actors.iter().find(|actor| actor.id == id)
    }

    /// Id of the entry activity: the declared one, else the only `start` activity
    pub fn start_activity_id(&self) -> Option<&str> {
        if let Some(declared) = self.start_activity.as_deref() {
            return Some(declared);
        }
        let mut starts = self
            .activities
            .iter()
            .filter(|activity| activity.kind == ActivityKind::Start);
        match (starts.next(), starts.next()) {
            (Some(start), None) => Some(start.id.as_str()),
            _ => None,
        }
    }
}
