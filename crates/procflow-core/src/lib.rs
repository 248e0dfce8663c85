//!
//! Procflow Core - process execution engine for the Procflow platform
//!
//! This crate turns validated process definitions into immutable graphs,
//! serves them from a registry, and drives process instances through them:
//! resolving the path an instance has taken, saving and committing
//! artifacts, and deciding where an instance goes next across conditional
//! branches and parallel fork/join sections.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use procflow_codec::Artifact;
//! use procflow_core::{
//!     MemoryProcessInstanceRepository, ProcessDefinitionRegistry, ProcessExecutionService,
//! };
//!
//! let yaml = r#"
//! dsl_version: "1.0"
//! process:
//!   name: survey
//!   activities:
//!     - { id: start, kind: start, next: visit }
//!     - { id: visit, kind: normal, next: done }
//!     - { id: done, kind: end }
//! "#;
//!
//! let registry = Arc::new(ProcessDefinitionRegistry::new());
//! registry.load("survey", yaml.as_bytes()).unwrap();
//! let service = ProcessExecutionService::new(
//!     registry,
//!     Arc::new(MemoryProcessInstanceRepository::new()),
//! );
//!
//! let instance = service.create_instance("survey", "Site 7", None).unwrap();
//! assert_eq!(instance.current_activity_id.as_str(), "visit");
//!
//! service
//!     .commit_activity(instance.id.as_str(), "visit", Artifact::new("a-1", b"<form/>".to_vec()))
//!     .unwrap();
//! let path = service.resolve_path(instance.id.as_str()).unwrap();
//! assert_eq!(path.len(), 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - definition graphs, instances and traversal rules
pub mod domain;

/// Application services - registry and execution service
pub mod application;

/// Core types
pub mod types;

/// Error types
pub mod error;

/// Configuration
pub mod config;

// Re-export key types
pub use config::RegistryConfig;
pub use error::CoreError;
pub use types::{ActivityId, ProcessDefinitionId, ProcessInstanceId, UserContext};

pub use application::process_execution_service::{
    CommitOutcome, OpenedActivity, ProcessExecutionService, RestoreReport,
};
pub use application::registry::{LoadReport, ProcessDefinitionRegistry};

pub use domain::activity::{ActivityDefinition, ActivityKind, Actor, ArtifactDefinition, SequenceFlow};
pub use domain::collaborators::{
    ActorAuthorizer, AllowAllActors, DefinitionSourceLoader, DirectoryDefinitionSource,
    InMemoryDefinitionSource, RoleBasedAuthorizer, ScriptContext, ScriptEvaluator,
};
pub use domain::path::PathResolver;
pub use domain::process_graph::ProcessGraph;
pub use domain::process_instance::{InstanceRecord, InstanceStatus, ProcessInstance};
pub use domain::repository::memory::MemoryProcessInstanceRepository;
pub use domain::repository::ProcessInstanceRepository;
pub use domain::snapshot::{decode_instance, encode_instance, RestoredArtifacts};

/// Returns the version of the core crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
