use serde::{Deserialize, Serialize};

/// Kind of an activity node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Entry point of the process
    Start,
    /// Plain unit of work
    Normal,
    /// Yes/no decision with two successors
    Conditional,
    /// Fork or join of a parallel section
    Parallel,
    /// Terminal activity
    End,
}

/// Role of a parallel activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceFlow {
    /// Opens a parallel section
    Fork,
    /// Closes a parallel section
    Join,
}

/// A role that may be assigned to activities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorDefinition {
    /// Unique identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Optional classification (e.g. "role", "team")
    #[serde(default)]
    pub kind: Option<String>,
}

/// Template metadata for the artifact an activity expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDefinitionDocument {
    /// Unique identifier within the process
    pub id: String,

    /// Artifact type (e.g. "form", "conditional", "attachment")
    #[serde(rename = "type")]
    pub artifact_type: String,

    /// Type-specific definition, usually a form layout
    #[serde(default)]
    pub definition: Option<String>,

    /// Script evaluated before the artifact is presented
    #[serde(default)]
    pub preconditions: Option<String>,

    /// Script evaluated after the artifact is committed
    #[serde(default)]
    pub postconditions: Option<String>,

    /// Reference to a printable template
    #[serde(default)]
    pub printable_template: Option<String>,
}

/// One activity of a process document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityDocument {
    /// Unique identifier within the process
    pub id: String,

    /// Node kind
    pub kind: ActivityKind,

    /// Display name. Defaults to the id.
    #[serde(default)]
    pub name: Option<String>,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Actor id restricting who may commit this activity
    #[serde(default)]
    pub actor: Option<String>,

    /// Whether the artifact may be edited after the instance has moved on
    #[serde(default)]
    pub idling: bool,

    /// Whether callers should ask for confirmation before committing
    #[serde(default)]
    pub confirm: bool,

    /// Successor for start, normal and end activities
    #[serde(default)]
    pub next: Option<String>,

    /// Successor when a conditional is answered `true`
    #[serde(default)]
    pub next_if_true: Option<String>,

    /// Successor when a conditional is answered `false`
    #[serde(default)]
    pub next_if_false: Option<String>,

    /// Fork or join, for parallel activities
    #[serde(default)]
    pub sequence_flow: Option<SequenceFlow>,

    /// Branch heads of a fork, or the successor of a join
    #[serde(default)]
    pub paths: Vec<String>,

    /// On a fork: the matching join
    #[serde(default)]
    pub incoming_sequence_flow_id: Option<String>,

    /// On a join: the matching fork
    #[serde(default)]
    pub outgoing_sequence_flow_id: Option<String>,

    /// Artifact this activity records
    #[serde(default)]
    pub artifact: Option<ArtifactDefinitionDocument>,

    /// Extra artifact shown next to a conditional's question
    #[serde(default)]
    pub information_artifact: Option<ArtifactDefinitionDocument>,
}

impl ActivityDocument {
    /// Whether this is a parallel fork
    pub fn is_fork(&self) -> bool {
        self.kind == ActivityKind::Parallel && self.sequence_flow == Some(SequenceFlow::Fork)
    }

    /// Whether this is a parallel join
    pub fn is_join(&self) -> bool {
        self.kind == ActivityKind::Parallel && self.sequence_flow == Some(SequenceFlow::Join)
    }

    /// Every activity id this activity can move to, in declaration order
    pub fn successor_ids(&self) -> Vec<&str> {
        let mut successors: Vec<&str> = Vec::new();
        for id in [&self.next, &self.next_if_true, &self.next_if_false]
            .into_iter()
            .flatten()
        {
            successors.push(id);
        }
        successors.extend(self.paths.iter().map(String::as_str));
        successors
    }

    /// Both artifact definitions, when present
    pub fn artifact_definitions(&self) -> impl Iterator<Item = &ArtifactDefinitionDocument> {
        self.artifact.iter().chain(self.information_artifact.iter())
    }
}
