use serde::{Deserialize, Serialize};

pub use procflow_dsl::SequenceFlow;

use crate::types::ActivityId;

/// A role that may be assigned to an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Optional classification
    pub kind: Option<String>,
}

/// Template metadata for the artifact an activity expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDefinition {
    /// Identifier, unique within the process
    pub id: String,

    /// Artifact type (form, conditional, attachment, ...)
    pub artifact_type: String,

    /// Type-specific definition bytes
    pub definition: Option<Vec<u8>>,

    /// Script evaluated before the artifact is presented
    pub preconditions: Option<String>,

    /// Script evaluated after the artifact is committed
    pub postconditions: Option<String>,

    /// Printable template reference
    pub printable_template: Option<String>,
}

/// Kind-specific part of an activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ActivityKind {
    /// Entry point
    Start {
        /// Successor
        next: Option<ActivityId>,
    },
    /// Plain unit of work
    Normal {
        /// Successor
        next: Option<ActivityId>,
    },
    /// Terminal activity
    End {
        /// Successor, normally absent
        next: Option<ActivityId>,
    },
    /// Yes/no decision
    Conditional {
        /// Successor when the answer is `true`
        next_if_true: ActivityId,
        /// Successor when the answer is `false`
        next_if_false: ActivityId,
        /// Extra artifact shown next to the question
        information_artifact: Option<ArtifactDefinition>,
    },
    /// Fork or join of a parallel section
    Parallel {
        /// Fork or join
        sequence_flow: SequenceFlow,
        /// Branch heads of a fork; a join's first path is its successor
        paths: Vec<ActivityId>,
        /// On a fork: the matching join
        incoming_sequence_flow_id: Option<ActivityId>,
        /// On a join: the matching fork
        outgoing_sequence_flow_id: Option<ActivityId>,
        /// Fallback successor of a join without paths
        next: Option<ActivityId>,
    },
}

/// Node in a process definition graph. Immutable once the graph is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityDefinition {
    /// Identifier, unique within the process
    pub id: ActivityId,

    /// Display name
    pub name: String,

    /// Optional description
    pub description: Option<String>,

    /// Role restriction
    pub actor: Option<Actor>,

    /// Artifact this activity records
    pub artifact: Option<ArtifactDefinition>,

    /// Whether the artifact may be edited after the instance moved on
    pub idling: bool,

    /// Whether callers should confirm before committing
    pub confirm: bool,

    /// Kind-specific fields
    #[serde(flatten)]
    pub kind: ActivityKind,
}

impl ActivityDefinition {
    /// Short name of the kind, for logs
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ActivityKind::Start { .. } => "start",
            ActivityKind::Normal { .. } => "normal",
            ActivityKind::End { .. } => "end",
            ActivityKind::Conditional { .. } => "conditional",
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Fork,
                ..
            } => "fork",
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Join,
                ..
            } => "join",
        }
    }

    /// Whether this is the start activity
    pub fn is_start(&self) -> bool {
        matches!(self.kind, ActivityKind::Start { .. })
    }

    /// Whether this is an end activity
    pub fn is_end(&self) -> bool {
        matches!(self.kind, ActivityKind::End { .. })
    }

    /// Whether this is a conditional activity
    pub fn is_conditional(&self) -> bool {
        matches!(self.kind, ActivityKind::Conditional { .. })
    }

    /// Whether this is a parallel fork
    pub fn is_fork(&self) -> bool {
        matches!(
            self.kind,
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Fork,
                ..
            }
        )
    }

    /// Whether this is a parallel join
    pub fn is_join(&self) -> bool {
        matches!(
            self.kind,
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Join,
                ..
            }
        )
    }

    /// The `next` successor of start, normal and end activities
    pub fn next(&self) -> Option<&ActivityId> {
        match &self.kind {
            ActivityKind::Start { next }
            | ActivityKind::Normal { next }
            | ActivityKind::End { next } => next.as_ref(),
            _ => None,
        }
    }

    /// Branch heads of a parallel activity
    pub fn paths(&self) -> &[ActivityId] {
        match &self.kind {
            ActivityKind::Parallel { paths, .. } => paths,
            _ => &[],
        }
    }

    /// Matching join of a fork, once paired
    pub fn paired_join(&self) -> Option<&ActivityId> {
        match &self.kind {
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Fork,
                incoming_sequence_flow_id,
                ..
            } => incoming_sequence_flow_id.as_ref(),
            _ => None,
        }
    }

    /// Matching fork of a join, once paired
    pub fn paired_fork(&self) -> Option<&ActivityId> {
        match &self.kind {
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Join,
                outgoing_sequence_flow_id,
                ..
            } => outgoing_sequence_flow_id.as_ref(),
            _ => None,
        }
    }

    /// Successor of a join: its first path, else its `next`
    pub fn join_successor(&self) -> Option<&ActivityId> {
        match &self.kind {
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Join,
                paths,
                next,
                ..
            } => paths.first().or(next.as_ref()),
            _ => None,
        }
    }

    /// Every activity this one can move to
    pub fn successors(&self) -> Vec<&ActivityId> {
        match &self.kind {
            ActivityKind::Start { next }
            | ActivityKind::Normal { next }
            | ActivityKind::End { next } => next.iter().collect(),
            ActivityKind::Conditional {
                next_if_true,
                next_if_false,
                ..
            } => vec![next_if_true, next_if_false],
            ActivityKind::Parallel { paths, next, .. } => paths.iter().chain(next.iter()).collect(),
        }
    }

    /// Id under which this activity's artifact is persisted
    pub fn artifact_definition_id(&self) -> &str {
        self.artifact
            .as_ref()
            .map(|definition| definition.id.as_str())
            .unwrap_or_else(|| self.id.as_str())
    }
}
