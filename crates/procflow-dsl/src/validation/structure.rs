use std::collections::HashSet;
use crate::process::{ActivityDocument, ActivityKind, ParsedDocument, SequenceFlow};
use crate::utils::identifier::is_valid_identifier;
use crate::validation::{activity_path, error_codes, ValidationError, Validator};

/// Validates the basic shape of a process:
/// - identifiers are well formed and unique
/// - exactly one start activity, at least one end activity
/// - every activity carries the fields its kind needs
pub struct StructureValidator;

impl StructureValidator {
    /// Create a new structure validator
    pub fn new() -> Self {
        StructureValidator
    }

    fn validate_identifiers(&self, document: &ParsedDocument) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let process = &document.process;

        let mut activity_ids = HashSet::with_capacity(process.activities.len());
        for (idx, activity) in process.activities.iter().enumerate() {
            if !is_valid_identifier(&activity.id) {
                errors.push(ValidationError {
                    code: error_codes::INVALID_ID,
                    message: format!(
                        "Activity id '{}' may only contain letters, digits, '_', '.', ':' and '-'",
                        activity.id
                    ),
                    path: Some(format!("{}.id", activity_path(idx))),
                });
            }
            if !activity_ids.insert(activity.id.as_str()) {
                errors.push(ValidationError {
                    code: error_codes::DUPLICATE_ID,
                    message: format!(
                        "Duplicate activity ID: '{}' - activity IDs must be unique within a process",
                        activity.id
                    ),
                    path: Some(format!("{}.id", activity_path(idx))),
                });
            }
        }

        let mut actor_ids = HashSet::with_capacity(process.actors.len());
        for (idx, actor) in process.actors.iter().enumerate() {
            if !actor_ids.insert(actor.id.as_str()) {
                errors.push(ValidationError {
                    code: error_codes::DUPLICATE_ID,
                    message: format!("Duplicate actor ID: '{}'", actor.id),
                    path: Some(format!("process.actors[{}].id", idx)),
                });
            }
        }

        let mut artifact_ids = HashSet::new();
        for (idx, activity) in process.activities.iter().enumerate() {
            for definition in activity.artifact_definitions() {
                if !is_valid_identifier(&definition.id) {
                    errors.push(ValidationError {
                        code: error_codes::INVALID_ID,
                        message: format!(
                            "Artifact definition id '{}' of activity '{}' is not a valid identifier",
                            definition.id, activity.id
                        ),
                        path: Some(activity_path(idx)),
                    });
                }
                if !artifact_ids.insert(definition.id.as_str()) {
                    errors.push(ValidationError {
                        code: error_codes::DUPLICATE_ID,
                        message: format!(
                            "Duplicate artifact definition ID: '{}' (activity '{}')",
                            definition.id, activity.id
                        ),
                        path: Some(activity_path(idx)),
                    });
                }
            }
        }

        errors
    }

    fn validate_terminals(&self, document: &ParsedDocument) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let process = &document.process;

        let starts: Vec<&ActivityDocument> = process
            .activities
            .iter()
            .filter(|activity| activity.kind == ActivityKind::Start)
            .collect();

        match starts.as_slice() {
            [] => errors.push(ValidationError {
                code: error_codes::MISSING_START,
                message: format!("Process '{}' has no start activity", process.name),
                path: Some("process.activities".to_string()),
            }),
            [start] => {
                if let Some(declared) = process.start_activity.as_deref() {
                    if declared != start.id {
                        errors.push(ValidationError {
                            code: error_codes::MISSING_START,
                            message: format!(
                                "Declared start activity '{}' is not the start activity '{}'",
                                declared, start.id
                            ),
                            path: Some("process.start_activity".to_string()),
                        });
                    }
                }
            }
            many => errors.push(ValidationError {
                code: error_codes::MULTIPLE_START,
                message: format!(
                    "Process '{}' has {} start activities: {}",
                    process.name,
                    many.len(),
                    many.iter().map(|a| format!("'{}'", a.id)).collect::<Vec<_>>().join(", ")
                ),
                path: Some("process.activities".to_string()),
            }),
        }

        if !process.activities.iter().any(|a| a.kind == ActivityKind::End) {
            errors.push(ValidationError {
                code: error_codes::MISSING_END,
                message: format!("Process '{}' has no end activity", process.name),
                path: Some("process.activities".to_string()),
            });
        }

        errors
    }

    fn validate_kind_fields(&self, activity: &ActivityDocument, idx: usize) -> Vec<ValidationError> {
        let path = activity_path(idx);
        let missing = |field: &str, message: String| ValidationError {
            code: error_codes::MISSING_REQUIRED_FIELD,
            message,
            path: Some(format!("{}.{}", path, field)),
        };

        let mut errors = Vec::new();
        match activity.kind {
            ActivityKind::Start | ActivityKind::Normal => {
                if activity.next.is_none() {
                    errors.push(missing(
                        "next",
                        format!("Activity '{}' needs a 'next' activity", activity.id),
                    ));
                }
            }
            ActivityKind::End => {}
            ActivityKind::Conditional => {
                if activity.next_if_true.is_none() {
                    errors.push(missing(
                        "next_if_true",
                        format!("Conditional activity '{}' needs 'next_if_true'", activity.id),
                    ));
                }
                if activity.next_if_false.is_none() {
                    errors.push(missing(
                        "next_if_false",
                        format!("Conditional activity '{}' needs 'next_if_false'", activity.id),
                    ));
                }
            }
            ActivityKind::Parallel => match activity.sequence_flow {
                None => errors.push(missing(
                    "sequence_flow",
                    format!("Parallel activity '{}' needs 'sequence_flow' (fork or join)", activity.id),
                )),
                Some(SequenceFlow::Fork) => {
                    if activity.paths.is_empty() {
                        errors.push(missing(
                            "paths",
                            format!("Fork '{}' needs at least one path", activity.id),
                        ));
                    }
                }
                Some(SequenceFlow::Join) => {
                    if activity.paths.is_empty() && activity.next.is_none() {
                        errors.push(missing(
                            "next",
                            format!("Join '{}' needs a successor in 'paths' or 'next'", activity.id),
                        ));
                    }
                }
            },
        }
        errors
    }
}

impl Default for StructureValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl Validator for StructureValidator {
    fn validate(&self, document: &ParsedDocument) -> Vec<ValidationError> {
        if document.process.activities.is_empty() {
            return vec![ValidationError {
                code: error_codes::MISSING_REQUIRED_FIELD,
                message: format!("Process '{}' defines no activities", document.process.name),
                path: Some("process.activities".to_string()),
            }];
        }

        let mut errors = self.validate_identifiers(document);
        errors.extend(self.validate_terminals(document));
        for (idx, activity) in document.process.activities.iter().enumerate() {
            errors.extend(self.validate_kind_fields(activity, idx));
        }
        errors
    }
}
