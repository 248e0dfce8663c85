//! Repository traits for the Procflow engine
//!
//! The execution service persists instances through these traits so other
//! crates can plug in their own storage.

use super::process_instance::{InstanceRecord, InstanceStatus, ProcessInstance};
use crate::types::{ProcessDefinitionId, ProcessInstanceId};
use crate::CoreError;

/// Repository for process instances and their artifacts.
///
/// `save` replaces the whole record at once; a reader sees either the old
/// record or the new one.
pub trait ProcessInstanceRepository: Send + Sync {
    /// Find an instance record by ID
    fn find_by_id(&self, id: &ProcessInstanceId) -> Result<Option<InstanceRecord>, CoreError>;

    /// Save an instance record
    fn save(&self, record: &InstanceRecord) -> Result<(), CoreError>;

    /// Delete an instance record, returning whether it existed
    fn delete(&self, id: &ProcessInstanceId) -> Result<bool, CoreError>;

    /// Ids of every instance of a process definition
    fn find_all_for_definition(
        &self,
        definition_id: &ProcessDefinitionId,
    ) -> Result<Vec<ProcessInstanceId>, CoreError>;

    /// List instances with optional filters
    fn list_instances(
        &self,
        definition_id: Option<&ProcessDefinitionId>,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>, CoreError>;
}

/// In-memory instance store
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::Arc;

    /// In-memory implementation of the instance repository, backed by
    /// concurrent maps
    #[derive(Clone)]
    pub struct MemoryProcessInstanceRepository {
        records: Arc<DashMap<String, InstanceRecord>>,
        definition_instances: Arc<DashMap<String, Vec<String>>>,
    }

    impl MemoryProcessInstanceRepository {
        /// Create an empty repository
        pub fn new() -> Self {
            Self {
                records: Arc::new(DashMap::with_capacity(64)),
                definition_instances: Arc::new(DashMap::with_capacity(16)),
            }
        }

        /// Number of stored instances
        pub fn len(&self) -> usize {
            self.records.len()
        }

        /// Whether the repository holds no instances
        pub fn is_empty(&self) -> bool {
            self.records.is_empty()
        }
    }

    impl Default for MemoryProcessInstanceRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ProcessInstanceRepository for MemoryProcessInstanceRepository {
        fn find_by_id(&self, id: &ProcessInstanceId) -> Result<Option<InstanceRecord>, CoreError> {
            Ok(self.records.get(id.as_str()).map(|record| record.clone()))
        }

        fn save(&self, record: &InstanceRecord) -> Result<(), CoreError> {
            let instance = &record.instance;
            self.records.insert(instance.id.to_string(), record.clone());

            let mut ids = self
                .definition_instances
                .entry(instance.process_definition_id.to_string())
                .or_default();
            if !ids.contains(&instance.id.0) {
                ids.push(instance.id.to_string());
            }

            Ok(())
        }

        fn delete(&self, id: &ProcessInstanceId) -> Result<bool, CoreError> {
            let Some((_, record)) = self.records.remove(id.as_str()) else {
                return Ok(false);
            };

            if let Some(mut ids) = self
                .definition_instances
                .get_mut(record.instance.process_definition_id.as_str())
            {
                ids.retain(|existing| existing != id.as_str());
            }

            Ok(true)
        }

        fn find_all_for_definition(
            &self,
            definition_id: &ProcessDefinitionId,
        ) -> Result<Vec<ProcessInstanceId>, CoreError> {
            Ok(self
                .definition_instances
                .get(definition_id.as_str())
                .map(|ids| ids.iter().map(|id| ProcessInstanceId(id.clone())).collect())
                .unwrap_or_default())
        }

        fn list_instances(
            &self,
            definition_id: Option<&ProcessDefinitionId>,
            status: Option<InstanceStatus>,
        ) -> Result<Vec<ProcessInstance>, CoreError> {
            let matches_status =
                |instance: &ProcessInstance| status.map_or(true, |status| instance.status == status);

            let mut result = Vec::new();
            if let Some(definition_id) = definition_id {
                if let Some(ids) = self.definition_instances.get(definition_id.as_str()) {
                    for id in ids.iter() {
                        if let Some(record) = self.records.get(id) {
                            if matches_status(&record.instance) {
                                result.push(record.instance.clone());
                            }
                        }
                    }
                }
            } else {
                for record in self.records.iter() {
                    if matches_status(&record.instance) {
                        result.push(record.instance.clone());
                    }
                }
            }

            Ok(result)
        }
    }
}
