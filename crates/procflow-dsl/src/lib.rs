//! # Procflow DSL
//!
//! The Procflow DSL is a YAML-based language for defining processes: directed
//! flows of activities that may branch on a yes/no answer or fork into
//! parallel paths that later join. This crate parses, validates, and
//! represents process definition documents.
//!
//! ## Features
//!
//! * YAML documents with a versioned envelope
//! * Kind-specific activity fields (conditional branches, fork/join pairing)
//! * Reference validation for successors, actors and sequence flows
//! * Reachability check from the start activity to an end activity
//!
//! ## Example
//!
//! ```
//! use procflow_dsl::parse_and_validate_process_definition;
//!
//! let yaml = r#"
//! dsl_version: "1.0"
//! process:
//!   name: site-survey
//!   start_activity: start
//!   activities:
//!     - id: start
//!       kind: start
//!       next: survey
//!     - id: survey
//!       kind: normal
//!       next: done
//!       artifact:
//!         id: survey-form
//!         type: form
//!     - id: done
//!       kind: end
//! "#;
//!
//! let result = parse_and_validate_process_definition(yaml);
//! assert!(result.is_ok());
//! ```

mod error;
mod parser;
mod utils;

pub mod process;
pub mod validation;

pub use error::DslError;
pub use parser::{parse_dsl_document, SUPPORTED_DSL_VERSION};
pub use process::{
    ActivityDocument, ActivityKind, ActorDefinition, ArtifactDefinitionDocument, ParsedDocument,
    ProcessDocument, SequenceFlow,
};
pub use validation::{error_codes, validate_document, ValidationError};

/// Parse and validate a Procflow DSL YAML string.
///
/// # Errors
///
/// * Invalid YAML syntax or unknown activity kinds
/// * Unsupported DSL version
/// * Validation errors (duplicate ids, dangling references, broken fork/join pairing)
///
/// ```
/// use procflow_dsl::{error_codes, parse_and_validate_process_definition};
///
/// let invalid_yaml = r#"
/// dsl_version: "1.0"
/// process:
///   name: broken
///   activities:
///     - id: start
///       kind: start
///       next: nowhere   # This activity doesn't exist
///     - id: done
///       kind: end
/// "#;
///
/// let error = parse_and_validate_process_definition(invalid_yaml).unwrap_err();
/// assert!(error.has_code(error_codes::INVALID_REFERENCE));
/// ```
pub fn parse_and_validate_process_definition(yaml_str: &str) -> Result<ParsedDocument, DslError> {
    let document = parser::parse_dsl_document(yaml_str)?;
    validation::validate_document(&document)?;
    Ok(document)
}

/// Returns a version string for the Procflow DSL crate
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_document() {
        let yaml = r#"
        dsl_version: "1.0"
        process:
          name: approvals
          activities:
            - { id: start, kind: start, next: review }
            - { id: review, kind: conditional, next_if_true: done, next_if_false: start }
            - { id: done, kind: end }
        "#;

        let result = parse_and_validate_process_definition(yaml);
        assert!(result.is_ok(), "Failed to parse valid document: {:?}", result.err());
    }

    #[test]
    fn test_collects_errors_from_all_validators() {
        let yaml = r#"
        dsl_version: "1.0"
        process:
          name: broken
          activities:
            - { id: start, kind: start, next: ghost }
            - { id: start, kind: normal, next: start }
        "#;

        let error = parse_and_validate_process_definition(yaml).unwrap_err();
        assert_eq!(error.error_code(), "ERR_DSL_VALIDATION_MULTIPLE");
        assert!(error.has_code(error_codes::DUPLICATE_ID));
        assert!(error.has_code(error_codes::MISSING_END));
        assert!(error.has_code(error_codes::INVALID_REFERENCE));
    }

    #[test]
    fn test_version() {
        assert!(version().starts_with("0."));
    }
}
