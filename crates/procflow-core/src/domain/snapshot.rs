//! Mapping between an instance's artifact map and its encoded snapshot.

use procflow_codec::{
    decode_snapshot, encode_snapshot, Artifact, ArtifactEntry, InstanceSnapshot, SkippedEntry,
    SnapshotHeader,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::domain::path::PathResolver;
use crate::domain::process_graph::ProcessGraph;
use crate::domain::process_instance::ProcessInstance;
use crate::error::CoreError;
use crate::types::ActivityId;

/// Artifacts recovered from a snapshot
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestoredArtifacts {
    /// Header, when the document got that far
    pub header: Option<SnapshotHeader>,

    /// Recovered artifacts keyed by activity id
    pub artifacts: HashMap<ActivityId, Artifact>,

    /// Activities whose artifacts were recorded off the active path
    pub interrupted: HashSet<ActivityId>,

    /// Entries that could not be recovered
    pub skipped: Vec<SkippedEntry>,
}

/// Encode every stored artifact of `instance` in definition order.
///
/// Artifacts of activities that are no longer on the resolved path are
/// flagged as interrupted.
pub fn encode_instance(
    graph: &ProcessGraph,
    instance: &ProcessInstance,
    artifacts: &HashMap<ActivityId, Artifact>,
) -> Result<Vec<u8>, CoreError> {
    let path: HashSet<&str> = PathResolver::new(graph, artifacts)
        .resolve(instance.current_activity_id.as_str())?
        .into_iter()
        .map(|activity| activity.id.as_str())
        .collect();

    let entries: Vec<ArtifactEntry> = graph
        .flatten()
        .into_iter()
        .filter_map(|activity| {
            artifacts.get(activity.id.as_str()).map(|artifact| ArtifactEntry {
                artifact_definition_id: activity.artifact_definition_id().to_string(),
                artifact: artifact.clone(),
                interrupted: !path.contains(activity.id.as_str()),
            })
        })
        .collect();

    let snapshot = InstanceSnapshot {
        header: SnapshotHeader {
            instance_id: instance.id.to_string(),
            process_definition_id: instance.process_definition_id.to_string(),
            current_activity_id: instance.current_activity_id.to_string(),
        },
        entries,
    };

    debug!(
        instance_id = %instance.id,
        entries = snapshot.entries.len(),
        "Encoding instance snapshot"
    );
    Ok(encode_snapshot(&snapshot)?)
}

/// Recover the artifacts of a snapshot against a definition graph.
///
/// Corrupt entries and entries naming no activity of the graph are reported
/// in `skipped`; the rest are returned.
pub fn decode_instance(graph: &ProcessGraph, bytes: &[u8]) -> RestoredArtifacts {
    let decoded = decode_snapshot(bytes);
    let mut restored = RestoredArtifacts {
        header: decoded.header,
        skipped: decoded.skipped,
        ..Default::default()
    };

    if let Some(reason) = decoded.truncated {
        warn!(definition_id = %graph.id(), reason = %reason, "Snapshot truncated");
    }

    // Document positions of the entries that decoded cleanly
    let taken: HashSet<usize> = restored.skipped.iter().map(|skipped| skipped.index).collect();
    let mut positions = (0..).filter(|index| !taken.contains(index));

    for entry in decoded.entries {
        let position = positions.next().unwrap_or_default();
        let activity = graph
            .activity_for_artifact_definition(&entry.artifact_definition_id)
            .or_else(|| graph.activity(&entry.artifact_definition_id));

        let Some(activity) = activity else {
            warn!(
                definition_id = %graph.id(),
                artifact_definition_id = %entry.artifact_definition_id,
                "Snapshot entry names no activity of the definition"
            );
            restored.skipped.push(SkippedEntry {
                index: position,
                reason: format!(
                    "unknown artifact definition '{}'",
                    entry.artifact_definition_id
                ),
            });
            continue;
        };

        if entry.interrupted {
            restored.interrupted.insert(activity.id.clone());
        }
        restored.artifacts.insert(activity.id.clone(), entry.artifact);
    }

    restored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessDefinitionId;
    use procflow_codec::encode_boolean_value;
    use pretty_assertions::assert_eq;

    const CONDITIONAL: &str = r#"
dsl_version: "1.0"
process:
  name: conditional
  activities:
    - { id: start, kind: start, next: c }
    - id: c
      kind: conditional
      next_if_true: t
      next_if_false: f
      artifact: { id: c-answer, type: conditional }
    - { id: t, kind: normal, next: done }
    - { id: f, kind: normal, next: done }
    - { id: done, kind: end }
"#;

    fn graph() -> ProcessGraph {
        ProcessGraph::from_yaml(ProcessDefinitionId::from("conditional"), CONDITIONAL).unwrap()
    }

    #[test]
    fn test_encode_flags_artifacts_off_the_path() {
        let graph = graph();
        let instance = ProcessInstance::new(
            ProcessDefinitionId::from("conditional"),
            ActivityId::from("done"),
            "i",
            None,
        );

        let mut artifacts = HashMap::new();
        artifacts.insert(ActivityId::from("c"), Artifact::new("a-c", encode_boolean_value(false)));
        artifacts.insert(ActivityId::from("t"), Artifact::new("a-t", b"<t/>".to_vec()));
        artifacts.insert(ActivityId::from("f"), Artifact::new("a-f", b"<f/>".to_vec()));

        let bytes = encode_instance(&graph, &instance, &artifacts).unwrap();
        let restored = decode_instance(&graph, &bytes);

        assert_eq!(restored.artifacts, artifacts);
        assert!(restored.skipped.is_empty());
        assert_eq!(
            restored.interrupted,
            HashSet::from([ActivityId::from("t")])
        );
        let header = restored.header.unwrap();
        assert_eq!(header.instance_id, instance.id.to_string());
        assert_eq!(header.current_activity_id, "done");
    }

    #[test]
    fn test_entries_follow_definition_order() {
        let graph = graph();
        let instance = ProcessInstance::new(
            ProcessDefinitionId::from("conditional"),
            ActivityId::from("t"),
            "i",
            None,
        );
        let mut artifacts = HashMap::new();
        artifacts.insert(ActivityId::from("t"), Artifact::new("a-t", b"<t/>".to_vec()));
        artifacts.insert(ActivityId::from("c"), Artifact::new("a-c", encode_boolean_value(true)));

        let bytes = encode_instance(&graph, &instance, &artifacts).unwrap();
        let decoded = decode_snapshot(&bytes);
        let keys: Vec<&str> = decoded
            .entries
            .iter()
            .map(|entry| entry.artifact_definition_id.as_str())
            .collect();
        assert_eq!(keys, vec!["c-answer", "t"]);
    }

    #[test]
    fn test_unknown_entries_are_skipped() {
        let graph = graph();
        let snapshot = InstanceSnapshot {
            header: SnapshotHeader {
                instance_id: "i-1".to_string(),
                process_definition_id: "conditional".to_string(),
                current_activity_id: "t".to_string(),
            },
            entries: vec![
                ArtifactEntry {
                    artifact_definition_id: "retired-form".to_string(),
                    artifact: Artifact::new("a-x", b"<x/>".to_vec()),
                    interrupted: false,
                },
                ArtifactEntry {
                    artifact_definition_id: "t".to_string(),
                    artifact: Artifact::new("a-t", b"<t/>".to_vec()),
                    interrupted: false,
                },
            ],
        };
        let bytes = encode_snapshot(&snapshot).unwrap();

        let restored = decode_instance(&graph, &bytes);
        assert_eq!(restored.artifacts.len(), 1);
        assert!(restored.artifacts.contains_key("t"));
        assert_eq!(restored.skipped.len(), 1);
        assert!(restored.skipped[0].reason.contains("retired-form"));
    }

    #[test]
    fn test_garbage_restores_nothing() {
        let restored = decode_instance(&graph(), b"not a snapshot");
        assert!(restored.artifacts.is_empty());
        assert!(restored.header.is_none());
    }
}
