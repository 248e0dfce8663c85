//! Procflow Tests
//!
//! Definition sources and helpers shared by the workspace's end-to-end
//! scenarios.

use procflow_codec::{encode_boolean_value, Artifact};
use procflow_core::{MemoryProcessInstanceRepository, ProcessDefinitionRegistry, ProcessExecutionService};
use std::sync::{Arc, Once};

/// Start → A → B → End
pub const LINEAR: &str = r#"
dsl_version: "1.0"
process:
  name: linear
  activities:
    - { id: start, kind: start, next: a }
    - { id: a, kind: normal, next: b, artifact: { id: a-form, type: form } }
    - { id: b, kind: normal, next: done, artifact: { id: b-form, type: form } }
    - { id: done, kind: end }
"#;

/// Start → C → {T, F} → End
pub const CONDITIONAL: &str = r#"
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

/// Start → F(P1, P2) → J → End, paired from the join side
pub const FORK_JOIN: &str = r#"
dsl_version: "1.0"
process:
  name: fork-join
  activities:
    - { id: start, kind: start, next: f }
    - { id: f, kind: parallel, sequence_flow: fork, paths: [p1, p2] }
    - { id: p1, kind: normal, next: j }
    - { id: p2, kind: normal, next: j }
    - { id: j, kind: parallel, sequence_flow: join, next: done, outgoing_sequence_flow_id: f }
    - { id: done, kind: end }
"#;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
///
/// Honours `RUST_LOG`, defaulting to `procflow_core=debug`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("procflow_core=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// Registry holding every fixture under its lowercase name
pub fn registry() -> Arc<ProcessDefinitionRegistry> {
    let registry = Arc::new(ProcessDefinitionRegistry::new());
    for (id, source) in [("linear", LINEAR), ("conditional", CONDITIONAL), ("fork-join", FORK_JOIN)] {
        if let Err(e) = registry.load(id, source.as_bytes()) {
            panic!("fixture {} does not load: {}", id, e);
        }
    }
    registry
}

/// Execution service over the fixture registry and an empty in-memory store
pub fn service() -> ProcessExecutionService {
    init_tracing();
    ProcessExecutionService::new(registry(), Arc::new(MemoryProcessInstanceRepository::new()))
}

/// A form artifact with distinguishable content
pub fn form(id: &str) -> Artifact {
    Artifact::new(id, format!("<form id=\"{}\"/>", id).into_bytes())
        .with_name(format!("{} form", id))
        .with_content_type("text/xml")
}

/// A conditional answer artifact
pub fn answer(value: bool) -> Artifact {
    Artifact::new(format!("answer-{}", value), encode_boolean_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_load() {
        let registry = registry();
        assert_eq!(registry.definition_ids(), vec!["conditional", "fork-join", "linear"]);
    }
}
