//! In-memory process definition graph.
//!
//! Activities live in an arena indexed by position; every edge is an
//! [`ActivityId`] resolved through the id index. A graph is built once from a
//! validated [`ParsedDocument`] and never mutated afterwards.

use procflow_dsl::{
    parse_and_validate_process_definition, ActivityDocument, ArtifactDefinitionDocument,
    ParsedDocument,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::activity::{ActivityDefinition, ActivityKind, Actor, ArtifactDefinition, SequenceFlow};
use crate::error::CoreError;
use crate::types::{ActivityId, ProcessDefinitionId};

/// One loaded process definition
#[derive(Debug, Clone, Serialize)]
pub struct ProcessGraph {
    id: ProcessDefinitionId,
    name: String,
    description: Option<String>,
    version: Option<String>,
    enabled: bool,
    metadata: HashMap<String, serde_json::Value>,
    activities: Vec<ActivityDefinition>,
    #[serde(skip)]
    index: HashMap<ActivityId, usize>,
    #[serde(skip)]
    artifact_index: HashMap<String, usize>,
    start: usize,
    #[serde(skip)]
    flattened: Vec<usize>,
}

impl ProcessGraph {
    /// Parse, validate and build a graph from a YAML source
    pub fn from_yaml(id: ProcessDefinitionId, yaml: &str) -> Result<Self, CoreError> {
        let document = parse_and_validate_process_definition(yaml)?;
        Self::from_document(id, &document)
    }

    /// Build a graph from an already validated document
    pub fn from_document(id: ProcessDefinitionId, document: &ParsedDocument) -> Result<Self, CoreError> {
        let process = &document.process;

        let mut index = HashMap::with_capacity(process.activities.len());
        for (position, activity) in process.activities.iter().enumerate() {
            if index.insert(ActivityId::from(activity.id.as_str()), position).is_some() {
                return Err(CoreError::MalformedDefinition(format!(
                    "{}: duplicate activity id '{}'",
                    id, activity.id
                )));
            }
        }

        let actors: HashMap<&str, Actor> = process
            .actors
            .iter()
            .map(|actor| {
                (
                    actor.id.as_str(),
                    Actor {
                        id: actor.id.clone(),
                        name: actor.name.clone(),
                        kind: actor.kind.clone(),
                    },
                )
            })
            .collect();

        let mut activities = process
            .activities
            .iter()
            .map(|activity| build_activity(&id, activity, &actors))
            .collect::<Result<Vec<_>, _>>()?;

        complete_pairing(&mut activities, &index);

        for activity in &activities {
            for successor in activity.successors() {
                if !index.contains_key(successor) {
                    return Err(CoreError::MalformedDefinition(format!(
                        "{}: activity '{}' points to unknown activity '{}'",
                        id, activity.id, successor
                    )));
                }
            }
            for paired in activity.paired_join().into_iter().chain(activity.paired_fork()) {
                if !index.contains_key(paired) {
                    return Err(CoreError::MalformedDefinition(format!(
                        "{}: activity '{}' is paired with unknown activity '{}'",
                        id, activity.id, paired
                    )));
                }
            }
        }

        let start_id = process.start_activity_id().ok_or_else(|| {
            CoreError::MalformedDefinition(format!("{}: missing start activity", id))
        })?;
        let start = *index.get(start_id).ok_or_else(|| {
            CoreError::MalformedDefinition(format!("{}: unknown start activity '{}'", id, start_id))
        })?;

        let mut artifact_index = HashMap::new();
        for (position, activity) in activities.iter().enumerate() {
            if let Some(artifact) = &activity.artifact {
                artifact_index.insert(artifact.id.clone(), position);
            }
        }

        let mut graph = Self {
            id,
            name: process.name.clone(),
            description: process.description.clone(),
            version: process.version.clone(),
            enabled: process.enabled,
            metadata: process.metadata.clone(),
            activities,
            index,
            artifact_index,
            start,
            flattened: Vec::new(),
        };
        graph.flattened = graph.compute_flattened();

        debug!(
            definition_id = %graph.id,
            activities = graph.activities.len(),
            reachable = graph.flattened.len(),
            "Built process graph"
        );
        Ok(graph)
    }

    /// Definition id
    pub fn id(&self) -> &ProcessDefinitionId {
        &self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Optional description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Optional version label
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Whether new instances may be created
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Free-form metadata from the definition source
    pub fn metadata(&self) -> &HashMap<String, serde_json::Value> {
        &self.metadata
    }

    /// The start activity
    pub fn start(&self) -> &ActivityDefinition {
        &self.activities[self.start]
    }

    /// Look up an activity by id
    pub fn activity(&self, id: &str) -> Option<&ActivityDefinition> {
        self.index.get(id).map(|&position| &self.activities[position])
    }

    /// Look up an activity by id, failing with `ActivityNotFound`
    pub fn require_activity(&self, id: &str) -> Result<&ActivityDefinition, CoreError> {
        self.activity(id).ok_or_else(|| {
            CoreError::ActivityNotFound(format!("{} in process definition {}", id, self.id))
        })
    }

    /// Activity whose artifact definition has the given id
    pub fn activity_for_artifact_definition(&self, id: &str) -> Option<&ActivityDefinition> {
        self.artifact_index
            .get(id)
            .map(|&position| &self.activities[position])
    }

    /// Every activity in declaration order, reachable or not
    pub fn activities(&self) -> &[ActivityDefinition] {
        &self.activities
    }

    /// Deduplicated activities reachable from the start, in depth-first order
    pub fn flatten(&self) -> Vec<&ActivityDefinition> {
        self.flattened
            .iter()
            .map(|&position| &self.activities[position])
            .collect()
    }

    fn compute_flattened(&self) -> Vec<usize> {
        let mut seen = HashSet::with_capacity(self.activities.len());
        let mut order = Vec::with_capacity(self.activities.len());
        let mut stack = vec![self.start];

        while let Some(position) = stack.pop() {
            if !seen.insert(position) {
                continue;
            }
            order.push(position);

            let activity = &self.activities[position];
            // Reverse so the first successor is visited first
            for successor in activity.successors().into_iter().rev() {
                if let Some(&next) = self.index.get(successor) {
                    if !seen.contains(&next) {
                        stack.push(next);
                    }
                }
            }
        }
        order
    }
}

fn convert_artifact(document: &ArtifactDefinitionDocument) -> ArtifactDefinition {
    ArtifactDefinition {
        id: document.id.clone(),
        artifact_type: document.artifact_type.clone(),
        definition: document.definition.as_ref().map(|d| d.as_bytes().to_vec()),
        preconditions: document.preconditions.clone(),
        postconditions: document.postconditions.clone(),
        printable_template: document.printable_template.clone(),
    }
}

fn build_activity(
    definition_id: &ProcessDefinitionId,
    document: &ActivityDocument,
    actors: &HashMap<&str, Actor>,
) -> Result<ActivityDefinition, CoreError> {
    let malformed = |what: &str| {
        CoreError::MalformedDefinition(format!(
            "{}: activity '{}' {}",
            definition_id, document.id, what
        ))
    };
    let id = |value: &Option<String>| value.as_deref().map(ActivityId::from);

    let actor = match document.actor.as_deref() {
        Some(actor_id) => Some(
            actors
                .get(actor_id)
                .cloned()
                .ok_or_else(|| malformed(&format!("references unknown actor '{}'", actor_id)))?,
        ),
        None => None,
    };

    let kind = match document.kind {
        procflow_dsl::ActivityKind::Start => ActivityKind::Start { next: id(&document.next) },
        procflow_dsl::ActivityKind::Normal => ActivityKind::Normal { next: id(&document.next) },
        procflow_dsl::ActivityKind::End => ActivityKind::End { next: id(&document.next) },
        procflow_dsl::ActivityKind::Conditional => ActivityKind::Conditional {
            next_if_true: id(&document.next_if_true)
                .ok_or_else(|| malformed("has no 'next_if_true'"))?,
            next_if_false: id(&document.next_if_false)
                .ok_or_else(|| malformed("has no 'next_if_false'"))?,
            information_artifact: document.information_artifact.as_ref().map(convert_artifact),
        },
        procflow_dsl::ActivityKind::Parallel => ActivityKind::Parallel {
            sequence_flow: document
                .sequence_flow
                .ok_or_else(|| malformed("has no 'sequence_flow'"))?,
            paths: document.paths.iter().map(|p| ActivityId::from(p.as_str())).collect(),
            incoming_sequence_flow_id: id(&document.incoming_sequence_flow_id),
            outgoing_sequence_flow_id: id(&document.outgoing_sequence_flow_id),
            next: id(&document.next),
        },
    };

    Ok(ActivityDefinition {
        id: ActivityId::from(document.id.as_str()),
        name: document.name.clone().unwrap_or_else(|| document.id.clone()),
        description: document.description.clone(),
        actor,
        artifact: document.artifact.as_ref().map(convert_artifact),
        idling: document.idling,
        confirm: document.confirm,
        kind,
    })
}

/// Fill in whichever side of a fork/join pairing the source left out
fn complete_pairing(activities: &mut [ActivityDefinition], index: &HashMap<ActivityId, usize>) {
    let mut links: Vec<(usize, ActivityId)> = Vec::new();

    for activity in activities.iter() {
        if let Some(fork_id) = activity.paired_fork() {
            if let Some(&fork) = index.get(fork_id) {
                links.push((fork, activity.id.clone()));
            }
        }
    }
    for (fork, join_id) in links {
        if let ActivityKind::Parallel {
            sequence_flow: SequenceFlow::Fork,
            incoming_sequence_flow_id,
            ..
        } = &mut activities[fork].kind
        {
            if incoming_sequence_flow_id.is_none() {
                *incoming_sequence_flow_id = Some(join_id);
            }
        }
    }

    let mut links: Vec<(usize, ActivityId)> = Vec::new();
    for activity in activities.iter() {
        if let Some(join_id) = activity.paired_join() {
            if let Some(&join) = index.get(join_id) {
                links.push((join, activity.id.clone()));
            }
        }
    }
    for (join, fork_id) in links {
        if let ActivityKind::Parallel {
            sequence_flow: SequenceFlow::Join,
            outgoing_sequence_flow_id,
            ..
        } = &mut activities[join].kind
        {
            if outgoing_sequence_flow_id.is_none() {
                *outgoing_sequence_flow_id = Some(fork_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PROVISIONING: &str = r#"
dsl_version: "1.0"
process:
  name: provisioning
  actors:
    - { id: installer, name: Installer }
  activities:
    - { id: start, kind: start, next: check }
    - id: check
      kind: conditional
      next_if_true: fork
      next_if_false: done
      artifact: { id: check-answer, type: conditional }
    - { id: fork, kind: parallel, sequence_flow: fork, paths: [power, rack] }
    - { id: power, kind: normal, next: join, actor: installer, artifact: { id: power-form, type: form } }
    - { id: rack, kind: normal, next: join, artifact: { id: rack-form, type: form } }
    - { id: join, kind: parallel, sequence_flow: join, paths: [signoff], outgoing_sequence_flow_id: fork }
    - { id: signoff, kind: normal, next: done }
    - { id: done, kind: end }
    - { id: orphan, kind: normal, next: done }
"#;

    fn graph() -> ProcessGraph {
        ProcessGraph::from_yaml(ProcessDefinitionId::from("provisioning"), PROVISIONING).unwrap()
    }

    #[test]
    fn test_lookups() {
        let graph = graph();
        assert_eq!(graph.name(), "provisioning");
        assert_eq!(graph.start().id.as_str(), "start");
        assert!(graph.activity("rack").is_some());
        assert!(graph.activity("missing").is_none());
        assert!(graph.require_activity("missing").unwrap_err().is_not_found());
        assert_eq!(
            graph.activity_for_artifact_definition("power-form").map(|a| a.id.as_str()),
            Some("power")
        );
        assert_eq!(
            graph.activity("power").and_then(|a| a.actor.as_ref()).map(|a| a.name.as_str()),
            Some("Installer")
        );
        assert_eq!(graph.activity("signoff").map(|a| a.name.as_str()), Some("signoff"));
    }

    #[test]
    fn test_pairing_completed_from_join_side() {
        let graph = graph();
        let fork = graph.activity("fork").unwrap();
        assert_eq!(fork.paired_join().map(|id| id.as_str()), Some("join"));
        let join = graph.activity("join").unwrap();
        assert_eq!(join.paired_fork().map(|id| id.as_str()), Some("fork"));
    }

    #[test]
    fn test_flatten_is_depth_first_and_deduplicated() {
        let graph = graph();
        let order: Vec<&str> = graph.flatten().iter().map(|a| a.id.as_str()).collect();
        assert_eq!(
            order,
            vec!["start", "check", "fork", "power", "join", "signoff", "done", "rack"]
        );
        assert_eq!(graph.activities().len(), 9);
    }

    #[test]
    fn test_malformed_source_is_rejected() {
        let yaml = r#"
dsl_version: "1.0"
process:
  name: broken
  activities:
    - { id: start, kind: start, next: nowhere }
    - { id: done, kind: end }
"#;
        let err = ProcessGraph::from_yaml(ProcessDefinitionId::from("broken"), yaml).unwrap_err();
        match err {
            CoreError::MalformedDefinition(msg) => assert!(msg.contains("nowhere")),
            other => panic!("Expected MalformedDefinition, got {:?}", other),
        }
    }

    #[test]
    fn test_unvalidated_document_with_dangling_reference() {
        let document: ParsedDocument = serde_yaml::from_str(
            r#"
dsl_version: "1.0"
process:
  name: raw
  activities:
    - { id: start, kind: start, next: ghost }
"#,
        )
        .unwrap();
        let err = ProcessGraph::from_document(ProcessDefinitionId::from("raw"), &document).unwrap_err();
        assert!(matches!(err, CoreError::MalformedDefinition(_)));
    }
}
