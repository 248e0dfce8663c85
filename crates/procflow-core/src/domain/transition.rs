//! Transition rules: where does an instance go from its current activity?
//!
//! These are pure functions of the graph and an artifact map, so a commit can
//! evaluate them against staged state before anything is written.

use procflow_codec::{decode_boolean_value, Artifact};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::activity::{ActivityDefinition, ActivityKind, SequenceFlow};
use crate::domain::process_graph::ProcessGraph;
use crate::error::CoreError;
use crate::types::ActivityId;

/// Resolve `id` and apply the fork-entry rule: a fork already paired with a
/// join is skipped in favour of that join.
pub fn enter<'g>(graph: &'g ProcessGraph, id: &str) -> Result<&'g ActivityDefinition, CoreError> {
    let activity = graph.require_activity(id)?;
    match activity.paired_join() {
        Some(join_id) => {
            debug!(fork_id = %activity.id, join_id = %join_id, "Entering paired fork at its join");
            graph.require_activity(join_id.as_str())
        }
        None => Ok(activity),
    }
}

/// The activity an instance positioned at `current_activity_id` moves to next
pub fn next_activity<'g>(
    graph: &'g ProcessGraph,
    artifacts: &HashMap<ActivityId, Artifact>,
    current_activity_id: &str,
) -> Result<&'g ActivityDefinition, CoreError> {
    let current = graph.require_activity(current_activity_id)?;

    match &current.kind {
        ActivityKind::Conditional {
            next_if_true,
            next_if_false,
            ..
        } => {
            let answer = artifacts
                .get(current.id.as_str())
                .map(|artifact| decode_boolean_value(&artifact.content))
                .unwrap_or(false);
            let branch = if answer { next_if_true } else { next_if_false };
            debug!(activity_id = %current.id, answer, branch = %branch, "Conditional branch chosen");
            enter(graph, branch.as_str())
        }
        ActivityKind::Parallel {
            sequence_flow: SequenceFlow::Join,
            ..
        } => {
            check_join_ready(graph, artifacts, current)?;
            let successor = current.join_successor().ok_or_else(|| {
                CoreError::NoNext(format!("join '{}' has no successor", current.id))
            })?;
            enter(graph, successor.as_str())
        }
        ActivityKind::Parallel { paths, .. } => {
            let first = paths.first().ok_or_else(|| {
                CoreError::NoNext(format!("fork '{}' has no paths", current.id))
            })?;
            graph.require_activity(first.as_str())
        }
        ActivityKind::Start { next } | ActivityKind::Normal { next } | ActivityKind::End { next } => {
            let next = next.as_ref().ok_or_else(|| {
                CoreError::NoNext(format!(
                    "{} activity '{}' has no successor",
                    current.kind_name(),
                    current.id
                ))
            })?;
            enter(graph, next.as_str())
        }
    }
}

/// Fail with `ParallelPathsIncomplete` unless every branch of the join's
/// fork has an artifact for each of its activities.
///
/// A join that is not paired with a fork has nothing to wait for.
pub fn check_join_ready(
    graph: &ProcessGraph,
    artifacts: &HashMap<ActivityId, Artifact>,
    join: &ActivityDefinition,
) -> Result<(), CoreError> {
    let Some(fork_id) = join.paired_fork() else {
        return Ok(());
    };
    let fork = graph.require_activity(fork_id.as_str())?;

    let mut visited = HashSet::new();
    let mut missing = Vec::new();
    for head in fork.paths() {
        collect_missing(graph, artifacts, head.as_str(), join.id.as_str(), &mut visited, &mut missing);
    }

    if missing.is_empty() {
        Ok(())
    } else {
        debug!(join_id = %join.id, missing = ?missing, "Join not ready");
        Err(CoreError::ParallelPathsIncomplete {
            join_id: join.id.to_string(),
            missing,
        })
    }
}

fn collect_missing<'g>(
    graph: &'g ProcessGraph,
    artifacts: &HashMap<ActivityId, Artifact>,
    id: &str,
    stop_at: &str,
    visited: &mut HashSet<&'g str>,
    missing: &mut Vec<String>,
) {
    if id == stop_at {
        return;
    }
    let Some(activity) = graph.activity(id) else {
        return;
    };
    if !visited.insert(activity.id.as_str()) {
        return;
    }

    match &activity.kind {
        ActivityKind::Parallel {
            sequence_flow: SequenceFlow::Fork,
            paths,
            incoming_sequence_flow_id: Some(nested_join),
            ..
        } => {
            for head in paths {
                collect_missing(graph, artifacts, head.as_str(), nested_join.as_str(), visited, missing);
            }
            let after = graph
                .activity(nested_join.as_str())
                .and_then(|join| join.join_successor());
            if let Some(after) = after {
                collect_missing(graph, artifacts, after.as_str(), stop_at, visited, missing);
            }
        }
        ActivityKind::Parallel { .. } => {
            let successor = activity.paths().first().or(activity.join_successor());
            if let Some(successor) = successor {
                collect_missing(graph, artifacts, successor.as_str(), stop_at, visited, missing);
            }
        }
        ActivityKind::Conditional {
            next_if_true,
            next_if_false,
            ..
        } => match artifacts.get(activity.id.as_str()) {
            Some(artifact) => {
                let branch = if decode_boolean_value(&artifact.content) {
                    next_if_true
                } else {
                    next_if_false
                };
                collect_missing(graph, artifacts, branch.as_str(), stop_at, visited, missing);
            }
            None => missing.push(activity.id.to_string()),
        },
        ActivityKind::Start { next } | ActivityKind::Normal { next } | ActivityKind::End { next } => {
            if !artifacts.contains_key(activity.id.as_str()) {
                missing.push(activity.id.to_string());
            }
            if let Some(next) = next {
                collect_missing(graph, artifacts, next.as_str(), stop_at, visited, missing);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ProcessDefinitionId;
    use procflow_codec::encode_boolean_value;

    fn graph(yaml: &str) -> ProcessGraph {
        ProcessGraph::from_yaml(ProcessDefinitionId::from("test"), yaml).unwrap()
    }

    fn filled(ids: &[&str]) -> HashMap<ActivityId, Artifact> {
        ids.iter()
            .map(|id| (ActivityId::from(*id), Artifact::new(*id, b"<form/>".to_vec())))
            .collect()
    }

    const FORK_JOIN: &str = r#"
dsl_version: "1.0"
process:
  name: fork-join
  activities:
    - { id: start, kind: start, next: before }
    - { id: before, kind: normal, next: fork }
    - { id: fork, kind: parallel, sequence_flow: fork, paths: [p1, p2], incoming_sequence_flow_id: join }
    - { id: p1, kind: normal, next: join }
    - { id: p2, kind: normal, next: p2b }
    - { id: p2b, kind: normal, next: join }
    - { id: join, kind: parallel, sequence_flow: join, next: done }
    - { id: done, kind: end }
"#;

    #[test]
    fn test_linear_successor() {
        let graph = graph(FORK_JOIN);
        let next = next_activity(&graph, &HashMap::new(), "start").unwrap();
        assert_eq!(next.id.as_str(), "before");
    }

    #[test]
    fn test_fork_entry_rule_skips_to_join() {
        let graph = graph(FORK_JOIN);
        let next = next_activity(&graph, &HashMap::new(), "before").unwrap();
        assert_eq!(next.id.as_str(), "join");
        assert_eq!(enter(&graph, "p1").unwrap().id.as_str(), "p1");
    }

    #[test]
    fn test_join_waits_for_every_branch() {
        let graph = graph(FORK_JOIN);

        match next_activity(&graph, &filled(&["p1", "p2"]), "join") {
            Err(CoreError::ParallelPathsIncomplete { join_id, missing }) => {
                assert_eq!(join_id, "join");
                assert_eq!(missing, vec!["p2b".to_string()]);
            }
            other => panic!("Expected ParallelPathsIncomplete, got {:?}", other),
        }

        let next = next_activity(&graph, &filled(&["p1", "p2", "p2b"]), "join").unwrap();
        assert_eq!(next.id.as_str(), "done");
    }

    #[test]
    fn test_conditional_defaults_to_false_branch() {
        let graph = graph(
            r#"
dsl_version: "1.0"
process:
  name: conditional
  activities:
    - { id: start, kind: start, next: c }
    - { id: c, kind: conditional, next_if_true: t, next_if_false: f }
    - { id: t, kind: normal, next: done }
    - { id: f, kind: normal, next: done }
    - { id: done, kind: end }
"#,
        );
        assert_eq!(next_activity(&graph, &HashMap::new(), "c").unwrap().id.as_str(), "f");

        let mut artifacts = HashMap::new();
        artifacts.insert(ActivityId::from("c"), Artifact::new("c", encode_boolean_value(true)));
        assert_eq!(next_activity(&graph, &artifacts, "c").unwrap().id.as_str(), "t");

        artifacts.insert(ActivityId::from("c"), Artifact::new("c", b"garbage".to_vec()));
        assert_eq!(next_activity(&graph, &artifacts, "c").unwrap().id.as_str(), "f");
    }

    #[test]
    fn test_end_without_successor() {
        let graph = graph(FORK_JOIN);
        assert!(matches!(
            next_activity(&graph, &HashMap::new(), "done"),
            Err(CoreError::NoNext(_))
        ));
    }

    #[test]
    fn test_nested_fork_and_conditional_branches() {
        let graph = graph(
            r#"
dsl_version: "1.0"
process:
  name: nested
  activities:
    - { id: start, kind: start, next: outer }
    - { id: outer, kind: parallel, sequence_flow: fork, paths: [q, inner], incoming_sequence_flow_id: outer-join }
    - { id: q, kind: conditional, next_if_true: q-yes, next_if_false: outer-join }
    - { id: q-yes, kind: normal, next: outer-join }
    - { id: inner, kind: parallel, sequence_flow: fork, paths: [i1, i2], incoming_sequence_flow_id: inner-join }
    - { id: i1, kind: normal, next: inner-join }
    - { id: i2, kind: normal, next: inner-join }
    - { id: inner-join, kind: parallel, sequence_flow: join, next: wrap-up }
    - { id: wrap-up, kind: normal, next: outer-join }
    - { id: outer-join, kind: parallel, sequence_flow: join, next: done }
    - { id: done, kind: end }
"#,
        );

        let join = graph.activity("outer-join").unwrap();
        match check_join_ready(&graph, &HashMap::new(), join) {
            Err(CoreError::ParallelPathsIncomplete { missing, .. }) => {
                assert_eq!(missing, vec!["q", "i1", "i2", "wrap-up"]);
            }
            other => panic!("Expected ParallelPathsIncomplete, got {:?}", other),
        }

        let mut artifacts = filled(&["i1", "i2", "wrap-up"]);
        artifacts.insert(ActivityId::from("q"), Artifact::new("q", encode_boolean_value(false)));
        assert!(check_join_ready(&graph, &artifacts, join).is_ok());

        artifacts.insert(ActivityId::from("q"), Artifact::new("q", encode_boolean_value(true)));
        match check_join_ready(&graph, &artifacts, join) {
            Err(CoreError::ParallelPathsIncomplete { missing, .. }) => {
                assert_eq!(missing, vec!["q-yes"]);
            }
            other => panic!("Expected ParallelPathsIncomplete, got {:?}", other),
        }
    }
}
