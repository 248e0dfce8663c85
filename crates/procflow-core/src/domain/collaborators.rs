//! Interfaces to the components around the engine: where definition sources
//! come from, who may act for an actor, and how precondition scripts run.

use dashmap::DashMap;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::RegistryConfig;
use crate::domain::activity::Actor;
use crate::error::CoreError;
use crate::types::{ActivityId, ProcessInstanceId, UserContext};

/// Supplies raw definition sources by id
pub trait DefinitionSourceLoader: Send + Sync {
    /// Fetch the source bytes of one definition
    fn load_definition_source(&self, id: &str) -> Result<Vec<u8>, CoreError>;

    /// Ids of every definition this loader can supply
    fn list_definition_ids(&self) -> Result<Vec<String>, CoreError>;
}

/// Reads definitions from `<dir>/<id>.<extension>` files
#[derive(Debug, Clone)]
pub struct DirectoryDefinitionSource {
    dir: PathBuf,
    extension: String,
}

impl DirectoryDefinitionSource {
    /// Source over `dir`, matching files with `extension` (no leading dot)
    pub fn new(dir: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            extension: extension.into(),
        }
    }

    /// Source over the configured definitions directory
    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(&config.definitions_dir, &config.definition_extension)
    }

    /// Directory being read
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", id, self.extension))
    }
}

impl DefinitionSourceLoader for DirectoryDefinitionSource {
    fn load_definition_source(&self, id: &str) -> Result<Vec<u8>, CoreError> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Err(CoreError::ProcessDefinitionNotFound(format!(
                "{} (no file at {})",
                id,
                path.display()
            )));
        }
        debug!(definition_id = %id, path = %path.display(), "Reading definition source");
        Ok(fs::read(&path)?)
    }

    fn list_definition_ids(&self) -> Result<Vec<String>, CoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let matches = path
                .extension()
                .and_then(|extension| extension.to_str())
                .map_or(false, |extension| extension == self.extension);
            if let (true, Some(stem)) = (matches, path.file_stem().and_then(|s| s.to_str())) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Definition sources held in memory, mostly for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryDefinitionSource {
    sources: DashMap<String, Vec<u8>>,
}

impl InMemoryDefinitionSource {
    /// Empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a source, builder style
    pub fn with_source(self, id: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        self.insert(id, source);
        self
    }

    /// Add or replace a source
    pub fn insert(&self, id: impl Into<String>, source: impl Into<Vec<u8>>) {
        self.sources.insert(id.into(), source.into());
    }
}

impl DefinitionSourceLoader for InMemoryDefinitionSource {
    fn load_definition_source(&self, id: &str) -> Result<Vec<u8>, CoreError> {
        self.sources
            .get(id)
            .map(|source| source.clone())
            .ok_or_else(|| CoreError::ProcessDefinitionNotFound(id.to_string()))
    }

    fn list_definition_ids(&self) -> Result<Vec<String>, CoreError> {
        let mut ids: Vec<String> = self.sources.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        Ok(ids)
    }
}

/// Decides whether a user may commit an activity assigned to an actor
pub trait ActorAuthorizer: Send + Sync {
    /// Whether `user` may act as `actor`
    fn is_actor_allowed(&self, actor: &Actor, user: &UserContext) -> bool;
}

/// Lets everybody act as every actor
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllActors;

impl ActorAuthorizer for AllowAllActors {
    fn is_actor_allowed(&self, _actor: &Actor, _user: &UserContext) -> bool {
        true
    }
}

/// Allows a user holding a role named after the actor id; the system user
/// is always allowed
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleBasedAuthorizer;

impl ActorAuthorizer for RoleBasedAuthorizer {
    fn is_actor_allowed(&self, actor: &Actor, user: &UserContext) -> bool {
        user.is_system() || user.has_role(&actor.id)
    }
}

/// What a precondition script can see
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptContext {
    /// Instance being worked on
    pub instance_id: ProcessInstanceId,

    /// Activity about to be presented
    pub activity_id: ActivityId,

    /// Shared information of every stored artifact, keyed by
    /// `<activity id>.<key>`
    pub shared: HashMap<String, String>,
}

/// Evaluates precondition and postcondition scripts
pub trait ScriptEvaluator: Send + Sync {
    /// Run `script`, returning whether the condition holds
    fn evaluate(&self, script: &str, context: &ScriptContext) -> anyhow::Result<bool>;
}
