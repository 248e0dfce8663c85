use chrono::Utc;
use dashmap::DashMap;
use procflow_codec::{decode_boolean_value, Artifact, SkippedEntry};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::{
    application::registry::ProcessDefinitionRegistry,
    domain::activity::ActivityDefinition,
    domain::collaborators::{ActorAuthorizer, AllowAllActors, ScriptContext, ScriptEvaluator},
    domain::path::PathResolver,
    domain::process_graph::ProcessGraph,
    domain::process_instance::{InstanceRecord, InstanceStatus, ProcessInstance},
    domain::repository::ProcessInstanceRepository,
    domain::snapshot::{decode_instance, encode_instance},
    domain::transition,
    types::{ActivityId, ProcessDefinitionId, ProcessInstanceId, UserContext},
    CoreError,
};

/// Where a successful commit left the instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The instance moved on
    Advanced {
        /// Committed activity
        from: ActivityId,
        /// New current activity
        to: ActivityId,
    },
    /// An end activity was committed
    Completed {
        /// Committed end activity
        activity: ActivityId,
    },
}

/// Result of rehydrating an instance from a persisted snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreReport {
    /// The restored instance
    pub instance: ProcessInstance,

    /// Number of artifacts recovered
    pub restored: usize,

    /// Activities whose artifacts were recorded off the active path
    pub interrupted: Vec<ActivityId>,

    /// Entries that could not be recovered
    pub skipped: Vec<SkippedEntry>,
}

/// An activity prepared for presentation
#[derive(Debug, Clone, PartialEq)]
pub struct OpenedActivity {
    /// The activity
    pub activity: ActivityDefinition,

    /// Artifact stored so far, if any
    pub artifact: Option<Artifact>,

    /// Whether the artifact may be saved now
    pub editable: bool,

    /// Outcome of the precondition script, when one was evaluated
    pub precondition: Option<bool>,
}

/// Service driving process instances through their definitions
pub struct ProcessExecutionService {
    /// Loaded definitions
    registry: Arc<ProcessDefinitionRegistry>,

    /// Instance store
    instances: Arc<dyn ProcessInstanceRepository>,

    /// Actor checks for commits
    authorizer: Arc<dyn ActorAuthorizer>,

    /// One write lock per instance
    write_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ProcessExecutionService {
    /// Create a service that lets every user act as every actor
    pub fn new(
        registry: Arc<ProcessDefinitionRegistry>,
        instances: Arc<dyn ProcessInstanceRepository>,
    ) -> Self {
        Self {
            registry,
            instances,
            authorizer: Arc::new(AllowAllActors),
            write_locks: DashMap::new(),
        }
    }

    /// Replace the actor authorizer
    pub fn with_authorizer(mut self, authorizer: Arc<dyn ActorAuthorizer>) -> Self {
        self.authorizer = authorizer;
        self
    }

    /// The registry this service reads definitions from
    pub fn registry(&self) -> &Arc<ProcessDefinitionRegistry> {
        &self.registry
    }

    /// Create an instance positioned at the start activity's successor
    pub fn create_instance(
        &self,
        definition_id: &str,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Result<ProcessInstance, CoreError> {
        let graph = self.registry.get(definition_id)?;
        if !graph.is_enabled() {
            return Err(CoreError::DefinitionDisabled(definition_id.to_string()));
        }

        let artifacts = HashMap::new();
        let first = transition::next_activity(&graph, &artifacts, graph.start().id.as_str())?;

        let mut record = InstanceRecord::new(ProcessInstance::new(
            ProcessDefinitionId::from(definition_id),
            first.id.clone(),
            name,
            description,
        ));
        record.instance.artifacts_content = encode_instance(&graph, &record.instance, &artifacts)?;
        self.instances.save(&record)?;

        info!(
            instance_id = %record.instance.id,
            definition_id = %definition_id,
            current_activity_id = %record.instance.current_activity_id,
            "Process instance created"
        );
        Ok(record.instance)
    }

    /// Rehydrate an instance from a persisted snapshot.
    ///
    /// Entries that cannot be recovered are logged and reported; the rest of
    /// the history is kept.
    pub fn restore_instance(
        &self,
        definition_id: &str,
        instance_id: &str,
        current_activity_id: &str,
        artifacts_content: &[u8],
    ) -> Result<RestoreReport, CoreError> {
        let graph = self.registry.get(definition_id)?;
        let current = graph.require_activity(current_activity_id)?;

        let restored = decode_instance(&graph, artifacts_content);
        for skipped in &restored.skipped {
            warn!(
                instance_id = %instance_id,
                index = skipped.index,
                reason = %skipped.reason,
                "Skipped unreadable artifact entry"
            );
        }

        let mut instance = ProcessInstance::with_id(
            ProcessInstanceId::from(instance_id),
            ProcessDefinitionId::from(definition_id),
            current.id.clone(),
            instance_id,
            None,
        );
        if current.is_end() && restored.artifacts.contains_key(current.id.as_str()) {
            instance.status = InstanceStatus::Completed;
        }

        let id = instance.id.clone();
        let record = self.exclusive(&id, || {
            let mut record = InstanceRecord {
                instance,
                artifacts: restored.artifacts,
            };
            record.instance.artifacts_content = encode_instance(&graph, &record.instance, &record.artifacts)?;
            self.instances.save(&record)?;
            Ok(record)
        })?;

        let mut interrupted: Vec<ActivityId> = restored.interrupted.into_iter().collect();
        interrupted.sort_by(|a, b| a.as_str().cmp(b.as_str()));

        info!(
            instance_id = %instance_id,
            definition_id = %definition_id,
            restored = record.artifacts.len(),
            skipped = restored.skipped.len(),
            "Process instance restored"
        );
        Ok(RestoreReport {
            restored: record.artifacts.len(),
            instance: record.instance,
            interrupted,
            skipped: restored.skipped,
        })
    }

    /// Get an instance
    pub fn get_instance(&self, instance_id: &str) -> Result<ProcessInstance, CoreError> {
        Ok(self.record(instance_id)?.instance)
    }

    /// Remove an instance and its artifacts
    pub fn delete_instance(&self, instance_id: &str) -> Result<(), CoreError> {
        let id = ProcessInstanceId::from(instance_id);
        loop {
            let owner = self.write_lock(&id);
            let _guard = lock(&owner, &id)?;
            if !self.is_current_lock(&id, &owner) {
                continue;
            }

            // Retired while still held; writers queued on it retry with a fresh one
            let deleted = self.instances.delete(&id);
            self.retire_lock(&id, &owner);
            if !deleted? {
                return Err(CoreError::ProcessInstanceNotFound(instance_id.to_string()));
            }

            info!(instance_id = %instance_id, "Process instance deleted");
            return Ok(());
        }
    }

    /// Every instance of a definition
    pub fn instances_for_definition(&self, definition_id: &str) -> Result<Vec<ProcessInstance>, CoreError> {
        self.instances
            .list_instances(Some(&ProcessDefinitionId::from(definition_id)), None)
    }

    /// Activities the instance has gone through, up to and including its
    /// current activity
    pub fn resolve_path(&self, instance_id: &str) -> Result<Vec<ActivityDefinition>, CoreError> {
        let record = self.record(instance_id)?;
        let graph = self.registry.get(record.instance.process_definition_id.as_str())?;
        let path = PathResolver::new(&graph, &record.artifacts)
            .resolve(record.instance.current_activity_id.as_str())?;
        Ok(path.into_iter().cloned().collect())
    }

    /// The activity the instance would move to if its current activity were
    /// committed now
    pub fn next_activity(&self, instance_id: &str) -> Result<ActivityDefinition, CoreError> {
        let record = self.record(instance_id)?;
        let graph = self.registry.get(record.instance.process_definition_id.as_str())?;
        let next = transition::next_activity(
            &graph,
            &record.artifacts,
            record.instance.current_activity_id.as_str(),
        )?;
        Ok(next.clone())
    }

    /// Store or replace the artifact of an activity without advancing.
    ///
    /// Changing the answer of a conditional that was already answered moves
    /// the instance back to that conditional.
    pub fn save_artifact(
        &self,
        instance_id: &str,
        activity_id: &str,
        artifact: Artifact,
    ) -> Result<ProcessInstance, CoreError> {
        let id = ProcessInstanceId::from(instance_id);
        self.exclusive(&id, || self.save_locked(instance_id, activity_id, artifact))
    }

    fn save_locked(
        &self,
        instance_id: &str,
        activity_id: &str,
        artifact: Artifact,
    ) -> Result<ProcessInstance, CoreError> {
        let mut record = self.record(instance_id)?;
        let graph = self.registry.get(record.instance.process_definition_id.as_str())?;
        let activity = graph.require_activity(activity_id)?;
        let artifact = stamp_creation(artifact);

        if activity.is_conditional() {
            if let Some(previous) = record.artifacts.get(activity_id) {
                let before = decode_boolean_value(&previous.content);
                let after = decode_boolean_value(&artifact.content);
                if before != after {
                    info!(
                        instance_id = %instance_id,
                        activity_id = %activity_id,
                        from = %record.instance.current_activity_id,
                        answer = after,
                        "Conditional answer changed, instance re-opened at branch point"
                    );
                    record.instance.current_activity_id = activity.id.clone();
                    record.instance.status = InstanceStatus::Running;
                }
            }
        }

        record.artifacts.insert(activity.id.clone(), artifact);
        self.store(&graph, &mut record)?;

        debug!(instance_id = %instance_id, activity_id = %activity_id, "Artifact saved");
        Ok(record.instance)
    }

    /// Commit the current activity on behalf of the system user
    pub fn commit_activity(
        &self,
        instance_id: &str,
        activity_id: &str,
        artifact: Artifact,
    ) -> Result<CommitOutcome, CoreError> {
        self.commit_activity_as(instance_id, activity_id, artifact, &UserContext::system())
    }

    /// Store the artifact of the current activity and advance.
    ///
    /// The next activity is computed with the new artifact in place; when that
    /// fails the instance is left untouched.
    pub fn commit_activity_as(
        &self,
        instance_id: &str,
        activity_id: &str,
        artifact: Artifact,
        user: &UserContext,
    ) -> Result<CommitOutcome, CoreError> {
        let id = ProcessInstanceId::from(instance_id);
        self.exclusive(&id, || self.commit_locked(instance_id, activity_id, artifact, user))
    }

    fn commit_locked(
        &self,
        instance_id: &str,
        activity_id: &str,
        artifact: Artifact,
        user: &UserContext,
    ) -> Result<CommitOutcome, CoreError> {
        let mut record = self.record(instance_id)?;
        if record.instance.is_completed() {
            return Err(CoreError::InstanceCompleted(instance_id.to_string()));
        }
        if record.instance.current_activity_id.as_str() != activity_id {
            return Err(CoreError::NotCurrent {
                instance_id: instance_id.to_string(),
                activity_id: activity_id.to_string(),
                current_activity_id: record.instance.current_activity_id.to_string(),
            });
        }

        let graph = self.registry.get(record.instance.process_definition_id.as_str())?;
        let activity = graph.require_activity(activity_id)?;
        if let Some(actor) = &activity.actor {
            if !self.authorizer.is_actor_allowed(actor, user) {
                return Err(CoreError::ActorNotAllowed {
                    actor: actor.id.clone(),
                    user: user.user_id.clone(),
                });
            }
        }

        let mut staged = record.artifacts.clone();
        staged.insert(activity.id.clone(), stamp_commit(artifact));

        let outcome = if activity.is_end() {
            record.instance.status = InstanceStatus::Completed;
            CommitOutcome::Completed {
                activity: activity.id.clone(),
            }
        } else {
            let next = transition::next_activity(&graph, &staged, activity_id)?;
            record.instance.current_activity_id = next.id.clone();
            CommitOutcome::Advanced {
                from: activity.id.clone(),
                to: next.id.clone(),
            }
        };

        record.artifacts = staged;
        self.store(&graph, &mut record)?;

        info!(
            instance_id = %instance_id,
            activity_id = %activity_id,
            user = %user.user_id,
            current_activity_id = %record.instance.current_activity_id,
            completed = record.instance.is_completed(),
            "Activity committed"
        );
        Ok(outcome)
    }

    /// Artifact stored for an activity
    pub fn artifact_for_activity(&self, instance_id: &str, activity_id: &str) -> Result<Artifact, CoreError> {
        let record = self.record(instance_id)?;
        record.artifacts.get(activity_id).cloned().ok_or_else(|| {
            CoreError::ArtifactNotFound(format!(
                "activity '{}' of instance '{}'",
                activity_id, instance_id
            ))
        })
    }

    /// Every stored artifact of an instance, keyed by activity
    pub fn artifacts(&self, instance_id: &str) -> Result<HashMap<ActivityId, Artifact>, CoreError> {
        Ok(self.record(instance_id)?.artifacts)
    }

    /// Prepare an activity for presentation.
    ///
    /// When `evaluator` is given and the activity's artifact definition has a
    /// precondition script, the script is evaluated against the shared
    /// information of every stored artifact.
    pub fn open_activity(
        &self,
        instance_id: &str,
        activity_id: &str,
        evaluator: Option<&dyn ScriptEvaluator>,
    ) -> Result<OpenedActivity, CoreError> {
        let record = self.record(instance_id)?;
        let graph = self.registry.get(record.instance.process_definition_id.as_str())?;
        let activity = graph.require_activity(activity_id)?;
        let artifact = record.artifacts.get(activity_id).cloned();

        let is_current = record.instance.current_activity_id.as_str() == activity_id;
        let editable = is_current || {
            let on_path = PathResolver::new(&graph, &record.artifacts)
                .resolve(record.instance.current_activity_id.as_str())?
                .iter()
                .any(|step| step.id == activity.id);
            on_path && (activity.idling || artifact.is_none())
        };

        let script = activity
            .artifact
            .as_ref()
            .and_then(|definition| definition.preconditions.as_deref());
        let precondition = match (evaluator, script) {
            (Some(evaluator), Some(script)) => {
                let context = script_context(&record, &activity.id);
                let holds = evaluator.evaluate(script, &context).map_err(|e| {
                    CoreError::ConditionEvaluationError(format!("{}: {:#}", activity_id, e))
                })?;
                debug!(instance_id = %instance_id, activity_id = %activity_id, holds, "Precondition evaluated");
                Some(holds)
            }
            _ => None,
        };

        Ok(OpenedActivity {
            activity: activity.clone(),
            artifact,
            editable,
            precondition,
        })
    }

    /// Encode the instance's artifact history
    pub fn encode_instance(&self, instance_id: &str) -> Result<Vec<u8>, CoreError> {
        let record = self.record(instance_id)?;
        let graph = self.registry.get(record.instance.process_definition_id.as_str())?;
        encode_instance(&graph, &record.instance, &record.artifacts)
    }

    fn record(&self, instance_id: &str) -> Result<InstanceRecord, CoreError> {
        self.instances
            .find_by_id(&ProcessInstanceId::from(instance_id))?
            .ok_or_else(|| CoreError::ProcessInstanceNotFound(instance_id.to_string()))
    }

    fn store(&self, graph: &ProcessGraph, record: &mut InstanceRecord) -> Result<(), CoreError> {
        record.instance.artifacts_content = encode_instance(graph, &record.instance, &record.artifacts)?;
        record.instance.update_timestamp();
        self.instances.save(record)
    }

    /// Run `write` as the only writer of an instance.
    ///
    /// A lock found retired after waiting on it is dropped and the current one
    /// taken instead. When `write` finds no instance the lock is retired, so
    /// unknown ids leave no entries behind.
    fn exclusive<T>(
        &self,
        id: &ProcessInstanceId,
        write: impl FnOnce() -> Result<T, CoreError>,
    ) -> Result<T, CoreError> {
        loop {
            let owner = self.write_lock(id);
            let _guard = lock(&owner, id)?;
            if !self.is_current_lock(id, &owner) {
                continue;
            }

            let result = write();
            if matches!(result, Err(CoreError::ProcessInstanceNotFound(_))) {
                self.retire_lock(id, &owner);
            }
            return result;
        }
    }

    fn write_lock(&self, id: &ProcessInstanceId) -> Arc<Mutex<()>> {
        Arc::clone(self.write_locks.entry(id.to_string()).or_default().value())
    }

    fn is_current_lock(&self, id: &ProcessInstanceId, owner: &Arc<Mutex<()>>) -> bool {
        self.write_locks
            .get(id.as_str())
            .map_or(false, |current| Arc::ptr_eq(current.value(), owner))
    }

    fn retire_lock(&self, id: &ProcessInstanceId, owner: &Arc<Mutex<()>>) {
        self.write_locks
            .remove_if(id.as_str(), |_, current| Arc::ptr_eq(current, owner));
    }
}

fn lock<'a>(
    owner: &'a Mutex<()>,
    id: &ProcessInstanceId,
) -> Result<std::sync::MutexGuard<'a, ()>, CoreError> {
    owner
        .lock()
        .map_err(|_| CoreError::StateStoreError(format!("write lock poisoned for instance {}", id)))
}

fn stamp_creation(mut artifact: Artifact) -> Artifact {
    if artifact.creation_date == 0 {
        artifact.creation_date = Utc::now().timestamp_millis();
    }
    artifact
}

fn stamp_commit(artifact: Artifact) -> Artifact {
    let mut artifact = stamp_creation(artifact);
    if artifact.commit_date == 0 {
        artifact.commit_date = Utc::now().timestamp_millis();
    }
    artifact
}

fn script_context(record: &InstanceRecord, activity_id: &ActivityId) -> ScriptContext {
    let shared = record
        .artifacts
        .iter()
        .flat_map(|(owner, artifact)| {
            artifact
                .shared_information
                .iter()
                .map(move |pair| (format!("{}.{}", owner, pair.key), pair.value.clone()))
        })
        .collect();

    ScriptContext {
        instance_id: record.instance.id.clone(),
        activity_id: activity_id.clone(),
        shared,
    }
}
