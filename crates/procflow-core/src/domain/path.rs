//! Path resolution: which activities has an instance gone through?
//!
//! The path is recomputed from the definition graph and the instance's
//! artifacts on every query instead of being stored, so it can never drift
//! from the artifact history.

use procflow_codec::{decode_boolean_value, Artifact};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::domain::activity::{ActivityDefinition, ActivityKind, SequenceFlow};
use crate::domain::process_graph::ProcessGraph;
use crate::error::CoreError;
use crate::types::ActivityId;

/// Resolves the ordered activities an instance has traversed
pub struct PathResolver<'a> {
    graph: &'a ProcessGraph,
    artifacts: &'a HashMap<ActivityId, Artifact>,
}

struct Walk<'a> {
    target: &'a str,
    emitted: HashSet<&'a str>,
    reached: bool,
    path: Vec<&'a ActivityDefinition>,
}

impl<'a> PathResolver<'a> {
    /// Create a resolver over one instance's artifacts
    pub fn new(graph: &'a ProcessGraph, artifacts: &'a HashMap<ActivityId, Artifact>) -> Self {
        Self { graph, artifacts }
    }

    /// Activities from the start up to and including `current_activity_id`.
    ///
    /// The start activity itself is not part of the path.
    pub fn resolve(&self, current_activity_id: &str) -> Result<Vec<&'a ActivityDefinition>, CoreError> {
        let current = self.graph.require_activity(current_activity_id)?;

        let mut walk = Walk {
            target: current.id.as_str(),
            emitted: HashSet::new(),
            reached: false,
            path: Vec::new(),
        };
        self.walk(Some(self.graph.start()), &mut walk);

        walk.path.push(current);
        debug!(
            definition_id = %self.graph.id(),
            current_activity_id = %current.id,
            length = walk.path.len(),
            "Resolved instance path"
        );
        Ok(walk.path)
    }

    /// Answer recorded for a conditional, `default` when absent
    pub fn conditional_answer(&self, activity: &ActivityDefinition, default: bool) -> bool {
        self.artifacts
            .get(activity.id.as_str())
            .map(|artifact| decode_boolean_value(&artifact.content))
            .unwrap_or(default)
    }

    fn walk(&self, node: Option<&'a ActivityDefinition>, walk: &mut Walk<'a>) {
        let Some(node) = node else {
            return;
        };
        if node.id.as_str() == walk.target {
            walk.reached = true;
            return;
        }
        // A join is only emitted when its fork is expanded
        if node.is_join() {
            return;
        }
        if !walk.emitted.insert(node.id.as_str()) {
            return;
        }
        if !node.is_start() {
            walk.path.push(node);
        }

        match &node.kind {
            ActivityKind::Parallel {
                sequence_flow: SequenceFlow::Fork,
                paths,
                incoming_sequence_flow_id: Some(join_id),
                ..
            } => {
                for branch in paths {
                    self.walk(self.graph.activity(branch.as_str()), walk);
                }
                // Target inside a branch: the join and what follows it are
                // left out, unlike a plain walk that always emits the join
                if walk.reached {
                    return;
                }
                let Some(join) = self.graph.activity(join_id.as_str()) else {
                    return;
                };
                if join.id.as_str() == walk.target {
                    walk.reached = true;
                    return;
                }
                if !walk.emitted.insert(join.id.as_str()) {
                    return;
                }
                walk.path.push(join);
                let successor = join.join_successor().and_then(|id| self.graph.activity(id.as_str()));
                self.walk(successor, walk);
            }
            ActivityKind::Parallel { paths, .. } => {
                // Fork not yet paired with a join: follow its first branch only
                let first = paths.first().and_then(|id| self.graph.activity(id.as_str()));
                self.walk(first, walk);
            }
            ActivityKind::Conditional {
                next_if_true,
                next_if_false,
                ..
            } => {
                let branch = if self.conditional_answer(node, true) {
                    next_if_true
                } else {
                    next_if_false
                };
                self.walk(self.graph.activity(branch.as_str()), walk);
            }
            ActivityKind::Start { next } | ActivityKind::Normal { next } | ActivityKind::End { next } => {
                let next = next.as_ref().and_then(|id| self.graph.activity(id.as_str()));
                self.walk(next, walk);
            }
        }
    }
}
