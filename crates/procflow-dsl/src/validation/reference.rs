use std::collections::HashSet;
use crate::process::{ActivityDocument, ParsedDocument};
use crate::validation::{activity_path, error_codes, ValidationError, Validator};

/// Validates references in the DSL document:
/// - successor references (`next`, conditional branches, `paths`)
/// - the declared start activity
/// - actor references
/// - fork/join sequence flow references
pub struct ReferenceValidator;

impl ReferenceValidator {
    /// Create a new reference validator
    pub fn new() -> Self {
        ReferenceValidator
    }

    fn dangling(
        &self,
        kind: &str,
        target: &str,
        activity: &ActivityDocument,
        available: &HashSet<&str>,
        path: String,
    ) -> ValidationError {
        let mut names: Vec<&str> = available.iter().copied().collect();
        names.sort_unstable();
        ValidationError {
            code: error_codes::INVALID_REFERENCE,
            message: format!(
                "Activity '{}' references non-existent {} '{}'. Available: {}",
                activity.id,
                kind,
                target,
                names.iter().map(|n| format!("'{}'", n)).collect::<Vec<_>>().join(", ")
            ),
            path: Some(path),
        }
    }

    /// Checks that every successor of an activity exists
    fn validate_successors(
        &self,
        activity: &ActivityDocument,
        idx: usize,
        activity_ids: &HashSet<&str>,
    ) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let base = activity_path(idx);

        let single = [
            ("next", &activity.next),
            ("next_if_true", &activity.next_if_true),
            ("next_if_false", &activity.next_if_false),
            ("incoming_sequence_flow_id", &activity.incoming_sequence_flow_id),
            ("outgoing_sequence_flow_id", &activity.outgoing_sequence_flow_id),
        ];
        for (field, target) in single {
            if let Some(target) = target {
                if !activity_ids.contains(target.as_str()) {
                    errors.push(self.dangling(
                        "activity",
                        target,
                        activity,
                        activity_ids,
                        format!("{}.{}", base, field),
                    ));
                }
            }
        }

        for (path_idx, target) in activity.paths.iter().enumerate() {
            if !activity_ids.contains(target.as_str()) {
                errors.push(self.dangling(
                    "activity",
                    target,
                    activity,
                    activity_ids,
                    format!("{}.paths[{}]", base, path_idx),
                ));
            }
        }

        errors
    }
}

impl Default for ReferenceValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for ReferenceValidator {
    fn validate(&self, document: &ParsedDocument) -> Vec<ValidationError> {
        let process = &document.process;
        let mut errors = Vec::new();

        let activity_ids: HashSet<&str> =
            process.activities.iter().map(|a| a.id.as_str()).collect();
        let actor_ids: HashSet<&str> = process.actors.iter().map(|a| a.id.as_str()).collect();

        if let Some(start) = process.start_activity.as_deref() {
            if !activity_ids.contains(start) {
                errors.push(ValidationError {
                    code: error_codes::INVALID_REFERENCE,
                    message: format!("Start activity '{}' does not exist", start),
                    path: Some("process.start_activity".to_string()),
                });
            }
        }

        for (idx, activity) in process.activities.iter().enumerate() {
            errors.extend(self.validate_successors(activity, idx, &activity_ids));

            if let Some(actor) = activity.actor.as_deref() {
                if !actor_ids.contains(actor) {
                    errors.push(self.dangling(
                        "actor",
                        actor,
                        activity,
                        &actor_ids,
                        format!("{}.actor", activity_path(idx)),
                    ));
                }
            }
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_dsl_document;

    fn validate(yaml: &str) -> Vec<ValidationError> {
        ReferenceValidator::new().validate(&parse_dsl_document(yaml).unwrap())
    }

    #[test]
    fn test_all_references_resolve() {
        let yaml = r#"
        dsl_version: "1.0"
        process:
          name: ok
          start_activity: s
          actors:
            - { id: surveyor, name: Surveyor }
          activities:
            - { id: s, kind: start, next: c }
            - { id: c, kind: conditional, next_if_true: f, next_if_false: e, actor: surveyor }
            - { id: f, kind: parallel, sequence_flow: fork, paths: [a, b], incoming_sequence_flow_id: j }
            - { id: a, kind: normal, next: j }
            - { id: b, kind: normal, next: j }
            - { id: j, kind: parallel, sequence_flow: join, next: e, outgoing_sequence_flow_id: f }
            - { id: e, kind: end }
        "#;
        assert!(validate(yaml).is_empty());
    }

    #[test]
    fn test_dangling_references_are_reported() {
        let yaml = r#"
        dsl_version: "1.0"
        process:
          name: dangling
          start_activity: nowhere
          activities:
            - { id: s, kind: start, next: ghost }
            - { id: c, kind: conditional, next_if_true: e, next_if_false: phantom, actor: nobody }
            - { id: f, kind: parallel, sequence_flow: fork, paths: [e, missing] }
            - { id: e, kind: end }
        "#;
        let errors = validate(yaml);
        let paths: Vec<&str> = errors.iter().filter_map(|e| e.path.as_deref()).collect();
        assert_eq!(
            paths,
            vec![
                "process.start_activity",
                "process.activities[0].next",
                "process.activities[1].next_if_false",
                "process.activities[1].actor",
                "process.activities[2].paths[1]",
            ]
        );
        assert!(errors.iter().all(|e| e.code == error_codes::INVALID_REFERENCE));
        assert!(errors[1].message.contains("'ghost'"));
    }
}
