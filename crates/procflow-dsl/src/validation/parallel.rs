use std::collections::{HashMap, HashSet, VecDeque};
use crate::process::{ActivityDocument, ActivityKind, ParsedDocument};
use crate::validation::{activity_path, error_codes, ValidationError, Validator};

/// Validates parallel sections and overall reachability:
/// - a fork's `incoming_sequence_flow_id` names a join, a join's
///   `outgoing_sequence_flow_id` names a fork
/// - when both sides declare the pairing, they agree
/// - an end activity is reachable from the start
pub struct ParallelValidator;

impl ParallelValidator {
    /// Create a new parallel validator
    pub fn new() -> Self {
        ParallelValidator
    }

    fn validate_pairing(
        &self,
        activities: &HashMap<&str, (usize, &ActivityDocument)>,
        ordered: &[ActivityDocument],
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        for (idx, activity) in ordered.iter().enumerate() {
            if activity.is_fork() {
                if let Some(join_id) = activity.incoming_sequence_flow_id.as_deref() {
                    match activities.get(join_id) {
                        Some((_, join)) if !join.is_join() => errors.push(ValidationError {
                            code: error_codes::INVALID_PAIRING,
                            message: format!(
                                "Fork '{}' is paired with '{}', which is not a join",
                                activity.id, join_id
                            ),
                            path: Some(format!("{}.incoming_sequence_flow_id", activity_path(idx))),
                        }),
                        Some((_, join)) => {
                            if let Some(back) = join.outgoing_sequence_flow_id.as_deref() {
                                if back != activity.id {
                                    errors.push(ValidationError {
                                        code: error_codes::INVALID_PAIRING,
                                        message: format!(
                                            "Fork '{}' is paired with join '{}', but that join is paired with '{}'",
                                            activity.id, join_id, back
                                        ),
                                        path: Some(format!(
                                            "{}.incoming_sequence_flow_id",
                                            activity_path(idx)
                                        )),
                                    });
                                }
                            }
                        }
                        // Reported by the reference validator
                        None => {}
                    }
                }
            } else if activity.is_join() {
                if let Some(fork_id) = activity.outgoing_sequence_flow_id.as_deref() {
                    if let Some((_, fork)) = activities.get(fork_id) {
                        if !fork.is_fork() {
                            errors.push(ValidationError {
                                code: error_codes::INVALID_PAIRING,
                                message: format!(
                                    "Join '{}' is paired with '{}', which is not a fork",
                                    activity.id, fork_id
                                ),
                                path: Some(format!("{}.outgoing_sequence_flow_id", activity_path(idx))),
                            });
                        } else if let Some(forward) = fork.incoming_sequence_flow_id.as_deref() {
                            if forward != activity.id {
                                errors.push(ValidationError {
                                    code: error_codes::INVALID_PAIRING,
                                    message: format!(
                                        "Join '{}' is paired with fork '{}', but that fork is paired with '{}'",
                                        activity.id, fork_id, forward
                                    ),
                                    path: Some(format!(
                                        "{}.outgoing_sequence_flow_id",
                                        activity_path(idx)
                                    )),
                                });
                            }
                        }
                    }
                }
            } else if activity.incoming_sequence_flow_id.is_some()
                || activity.outgoing_sequence_flow_id.is_some()
            {
                errors.push(ValidationError {
                    code: error_codes::INVALID_PAIRING,
                    message: format!(
                        "Activity '{}' declares a sequence flow pairing but is not a fork or join",
                        activity.id
                    ),
                    path: Some(activity_path(idx)),
                });
            }
        }

        errors
    }

    fn validate_end_reachable(
        &self,
        document: &ParsedDocument,
        activities: &HashMap<&str, (usize, &ActivityDocument)>,
    ) -> Vec<ValidationError> {
        let start = match document.process.start_activity_id() {
            Some(start) if activities.contains_key(start) => start,
            // Missing or ambiguous start is reported by the other validators
            _ => return Vec::new(),
        };

        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            let Some((_, activity)) = activities.get(id) else {
                continue;
            };
            if activity.kind == ActivityKind::End {
                return Vec::new();
            }
            queue.extend(activity.successor_ids());
        }

        vec![ValidationError {
            code: error_codes::UNREACHABLE_END,
            message: format!(
                "No end activity is reachable from start activity '{}'",
                start
            ),
            path: Some("process.activities".to_string()),
        }]
    }
}

impl Default for ParallelValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for ParallelValidator {
    fn validate(&self, document: &ParsedDocument) -> Vec<ValidationError> {
        let ordered = &document.process.activities;
        let activities: HashMap<&str, (usize, &ActivityDocument)> = ordered
            .iter()
            .enumerate()
            .map(|(idx, activity)| (activity.id.as_str(), (idx, activity)))
            .collect();

        let mut errors = self.validate_pairing(&activities, ordered);
        errors.extend(self.validate_end_reachable(document, &activities));
        errors
    }
}
