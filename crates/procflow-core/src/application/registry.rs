use dashmap::DashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::{
    config::RegistryConfig,
    domain::activity::{ActivityDefinition, ArtifactDefinition},
    domain::collaborators::{DefinitionSourceLoader, DirectoryDefinitionSource},
    domain::process_graph::ProcessGraph,
    types::ProcessDefinitionId,
    CoreError,
};

/// Outcome of a bulk load
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Definitions now served by the registry
    pub loaded: Vec<String>,

    /// Definitions that could not be loaded, with the reason
    pub failed: Vec<(String, CoreError)>,
}

impl LoadReport {
    /// Whether every requested definition loaded
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Loads, indexes and serves process definition graphs.
///
/// Each entry is an immutable [`ProcessGraph`] behind an `Arc`; loading a
/// definition publishes a fully built graph in one swap, so concurrent
/// readers see either the old graph or the new one.
#[derive(Default)]
pub struct ProcessDefinitionRegistry {
    definitions: DashMap<String, Arc<ProcessGraph>>,
}

impl ProcessDefinitionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from `source` and publish it under `definition_id`,
    /// replacing any previous entry.
    ///
    /// On failure the previous entry, if any, stays in place.
    pub fn load(&self, definition_id: &str, source: &[u8]) -> Result<Arc<ProcessGraph>, CoreError> {
        let yaml = std::str::from_utf8(source).map_err(|e| {
            CoreError::MalformedDefinition(format!("{}: source is not UTF-8: {}", definition_id, e))
        })?;

        let graph = Arc::new(ProcessGraph::from_yaml(
            ProcessDefinitionId::from(definition_id),
            yaml,
        )?);
        let replaced = self
            .definitions
            .insert(definition_id.to_string(), Arc::clone(&graph))
            .is_some();

        info!(
            definition_id = %definition_id,
            name = %graph.name(),
            activities = graph.activities().len(),
            replaced,
            "Process definition loaded"
        );
        Ok(graph)
    }

    /// Get a definition graph
    pub fn get(&self, definition_id: &str) -> Result<Arc<ProcessGraph>, CoreError> {
        self.definitions
            .get(definition_id)
            .map(|graph| Arc::clone(graph.value()))
            .ok_or_else(|| CoreError::ProcessDefinitionNotFound(definition_id.to_string()))
    }

    /// Every activity reachable from the start, deduplicated, in depth-first
    /// order
    pub fn flatten_activities(&self, definition_id: &str) -> Result<Vec<ActivityDefinition>, CoreError> {
        Ok(self
            .get(definition_id)?
            .flatten()
            .into_iter()
            .cloned()
            .collect())
    }

    /// Load every definition `loader` lists
    pub fn load_all(
        &self,
        loader: &dyn DefinitionSourceLoader,
        skip_malformed: bool,
    ) -> Result<LoadReport, CoreError> {
        let ids = loader.list_definition_ids()?;
        self.load_ids(loader, &ids, skip_malformed)
    }

    /// Load the given definitions from `loader`.
    ///
    /// With `skip_malformed` a failing definition is logged and reported and
    /// the others still load; without it the first failure is returned.
    pub fn load_ids(
        &self,
        loader: &dyn DefinitionSourceLoader,
        ids: &[String],
        skip_malformed: bool,
    ) -> Result<LoadReport, CoreError> {
        let mut report = LoadReport::default();

        for id in ids {
            let result = loader
                .load_definition_source(id)
                .and_then(|source| self.load(id, &source));

            match result {
                Ok(_) => report.loaded.push(id.clone()),
                Err(e) if skip_malformed => {
                    warn!(definition_id = %id, error = %e, "Skipping process definition");
                    report.failed.push((id.clone(), e));
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            "Bulk load finished"
        );
        Ok(report)
    }

    /// Load every definition in the configured directory
    pub fn load_directory(&self, config: &RegistryConfig) -> Result<LoadReport, CoreError> {
        let source = DirectoryDefinitionSource::from_config(config);
        info!(dir = %source.dir().display(), "Loading process definitions from directory");
        self.load_all(&source, config.skip_malformed)
    }

    /// Fetch a definition again and replace the served graph
    pub fn reload(
        &self,
        definition_id: &str,
        loader: &dyn DefinitionSourceLoader,
    ) -> Result<Arc<ProcessGraph>, CoreError> {
        let source = loader.load_definition_source(definition_id)?;
        self.load(definition_id, &source).map_err(|e| {
            warn!(definition_id = %definition_id, error = %e, "Reload failed, keeping previous definition");
            e
        })
    }

    /// Stop serving a definition
    pub fn remove(&self, definition_id: &str) -> Option<Arc<ProcessGraph>> {
        let removed = self.definitions.remove(definition_id).map(|(_, graph)| graph);
        if removed.is_some() {
            info!(definition_id = %definition_id, "Process definition removed");
        }
        removed
    }

    /// Ids of every served definition, sorted
    pub fn definition_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .definitions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Every served definition, sorted by id
    pub fn definitions(&self) -> Vec<Arc<ProcessGraph>> {
        let mut graphs: Vec<Arc<ProcessGraph>> = self
            .definitions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        graphs.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        graphs
    }

    /// One activity of a definition
    pub fn activity(&self, definition_id: &str, activity_id: &str) -> Result<ActivityDefinition, CoreError> {
        Ok(self.get(definition_id)?.require_activity(activity_id)?.clone())
    }

    /// Artifact definition of one activity, `None` when it records none
    pub fn artifact_definition_for_activity(
        &self,
        definition_id: &str,
        activity_id: &str,
    ) -> Result<Option<ArtifactDefinition>, CoreError> {
        Ok(self.activity(definition_id, activity_id)?.artifact)
    }

    /// Number of served definitions
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Whether no definition is served
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
