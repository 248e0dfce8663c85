use chrono::{DateTime, Utc};
use procflow_codec::Artifact;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::types::{ActivityId, ProcessDefinitionId, ProcessInstanceId};

/// Process instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceStatus {
    /// Activities remain to be committed
    Running,

    /// An end activity has been committed
    Completed,
}

/// Aggregate: one execution of a process definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInstance {
    /// Unique identifier
    pub id: ProcessInstanceId,

    /// Definition this instance executes
    pub process_definition_id: ProcessDefinitionId,

    /// Display name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Activity the instance is positioned at
    pub current_activity_id: ActivityId,

    /// Encoded artifact history, refreshed on every write
    #[serde(with = "serde_bytes_as_string")]
    pub artifacts_content: Vec<u8>,

    /// Current status
    pub status: InstanceStatus,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl ProcessInstance {
    /// Create a running instance with a fresh id
    pub fn new(
        process_definition_id: ProcessDefinitionId,
        current_activity_id: ActivityId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self::with_id(
            ProcessInstanceId(Uuid::new_v4().to_string()),
            process_definition_id,
            current_activity_id,
            name,
            description,
        )
    }

    /// Create a running instance with a known id
    pub fn with_id(
        id: ProcessInstanceId,
        process_definition_id: ProcessDefinitionId,
        current_activity_id: ActivityId,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            process_definition_id,
            name: name.into(),
            description,
            current_activity_id,
            artifacts_content: Vec::new(),
            status: InstanceStatus::Running,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether an end activity has been committed
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == InstanceStatus::Completed
    }

    /// Update the timestamp
    #[inline]
    pub fn update_timestamp(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// An instance together with its artifacts, keyed by activity id.
///
/// This is the unit the instance store reads and writes, so readers never
/// observe an instance pointer without the artifacts it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRecord {
    /// The instance
    pub instance: ProcessInstance,

    /// Stored artifacts
    pub artifacts: HashMap<ActivityId, Artifact>,
}

impl InstanceRecord {
    /// Record with no artifacts yet
    pub fn new(instance: ProcessInstance) -> Self {
        Self {
            instance,
            artifacts: HashMap::new(),
        }
    }

    /// Artifact stored for an activity
    pub fn artifact(&self, activity_id: &str) -> Option<&Artifact> {
        self.artifacts.get(activity_id)
    }
}

mod serde_bytes_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        Ok(String::deserialize(deserializer)?.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_instance_is_running() {
        let instance = ProcessInstance::new(
            ProcessDefinitionId::from("provisioning"),
            ActivityId::from("survey"),
            "Site 42",
            None,
        );
        assert_eq!(instance.status, InstanceStatus::Running);
        assert!(!instance.is_completed());
        assert!(instance.artifacts_content.is_empty());
        assert!(Uuid::parse_str(instance.id.as_str()).is_ok());
    }

    #[test]
    fn test_instance_serializes_snapshot_as_text() {
        let mut instance = ProcessInstance::with_id(
            ProcessInstanceId::from("i-1"),
            ProcessDefinitionId::from("p"),
            ActivityId::from("a"),
            "name",
            Some("desc".to_string()),
        );
        instance.artifacts_content = b"<processInstance/>".to_vec();

        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(json["artifacts_content"], "<processInstance/>");
        assert_eq!(json["current_activity_id"], "a");

        let back: ProcessInstance = serde_json::from_value(json).unwrap();
        assert_eq!(back, instance);
    }
}
