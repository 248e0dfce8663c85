use thiserror::Error;

/// Core error type for the Procflow engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Process definition not found
    #[error("Process definition not found: {0}")]
    ProcessDefinitionNotFound(String),

    /// Process instance not found
    #[error("Process instance not found: {0}")]
    ProcessInstanceNotFound(String),

    /// Activity not found in a process definition
    #[error("Activity not found: {0}")]
    ActivityNotFound(String),

    /// No artifact stored for an activity of an instance
    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    /// Commit attempted on an activity that is not the instance's current activity
    #[error("Activity '{activity_id}' is not the current activity of instance '{instance_id}' (current: '{current_activity_id}')")]
    NotCurrent {
        /// Instance the commit targeted
        instance_id: String,
        /// Activity the caller tried to commit
        activity_id: String,
        /// Activity the instance is positioned at
        current_activity_id: String,
    },

    /// The process definition does not accept new instances
    #[error("Process definition disabled: {0}")]
    DefinitionDisabled(String),

    /// The instance has already committed an end activity
    #[error("Process instance already completed: {0}")]
    InstanceCompleted(String),

    /// A process definition could not be turned into a graph
    #[error("Malformed process definition: {0}")]
    MalformedDefinition(String),

    /// An artifact or snapshot could not be read
    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),

    /// The current activity has no successor
    #[error("No next activity: {0}")]
    NoNext(String),

    /// A join was reached before every branch of its fork was complete
    #[error("Parallel paths incomplete at join '{join_id}': missing artifacts for {}", .missing.join(", "))]
    ParallelPathsIncomplete {
        /// Join that was not ready
        join_id: String,
        /// Branch activities still lacking an artifact
        missing: Vec<String>,
    },

    /// The user may not act for the activity's actor
    #[error("User '{user}' is not allowed to act as '{actor}'")]
    ActorNotAllowed {
        /// Actor assigned to the activity
        actor: String,
        /// User that attempted the commit
        user: String,
    },

    /// Precondition or postcondition script failed to evaluate
    #[error("Condition evaluation error: {0}")]
    ConditionEvaluationError(String),

    /// State store error
    #[error("State store error: {0}")]
    StateStoreError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Input/output error
    #[error("Input/output error: {0}")]
    IOError(String),
}

impl CoreError {
    /// Whether this error means "something does not exist"
    ///
    /// Callers surface every such error as a recoverable not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProcessDefinitionNotFound(_)
                | CoreError::ProcessInstanceNotFound(_)
                | CoreError::ActivityNotFound(_)
                | CoreError::ArtifactNotFound(_)
        )
    }
}

impl From<procflow_dsl::DslError> for CoreError {
    fn from(err: procflow_dsl::DslError) -> Self {
        CoreError::MalformedDefinition(err.to_string())
    }
}

impl From<procflow_codec::CodecError> for CoreError {
    fn from(err: procflow_codec::CodecError) -> Self {
        CoreError::MalformedArtifact(err.to_string())
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::IOError(err.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(err: serde_yaml::Error) -> Self {
        CoreError::ConfigurationError(err.to_string())
    }
}
