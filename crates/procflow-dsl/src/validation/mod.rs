use std::fmt;
use std::error::Error;
use crate::process::ParsedDocument;
use crate::error::DslError;

mod parallel;
mod reference;
mod structure;

pub use parallel::ParallelValidator;
pub use reference::ReferenceValidator;
pub use structure::StructureValidator;

/// Represents a validation error that occurred during DSL processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Error code (should be a constant identifier)
    pub code: &'static str,

    /// Human-readable error message
    pub message: String,

    /// Optional path to the location of the error (e.g., "process.activities[2].next")
    pub path: Option<String>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(path) = &self.path {
            write!(f, "{}: {} (at {})", self.code, self.message, path)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl Error for ValidationError {}

/// Validation error codes
pub mod error_codes {
    /// Reference to an activity, actor or sequence flow that does not exist
    pub const INVALID_REFERENCE: &str = "ERR_DSL_VALIDATION_INVALID_REFERENCE";

    /// Duplicate ID found
    pub const DUPLICATE_ID: &str = "ERR_DSL_VALIDATION_DUPLICATE_ID";

    /// Identifier contains characters outside the allowed set
    pub const INVALID_ID: &str = "ERR_DSL_VALIDATION_INVALID_ID";

    /// Missing required field
    pub const MISSING_REQUIRED_FIELD: &str = "ERR_DSL_VALIDATION_MISSING_REQUIRED_FIELD";

    /// No start activity, or it does not match the declared one
    pub const MISSING_START: &str = "ERR_DSL_VALIDATION_MISSING_START";

    /// More than one start activity
    pub const MULTIPLE_START: &str = "ERR_DSL_VALIDATION_MULTIPLE_START";

    /// No end activity
    pub const MISSING_END: &str = "ERR_DSL_VALIDATION_MISSING_END";

    /// No end activity is reachable from the start
    pub const UNREACHABLE_END: &str = "ERR_DSL_VALIDATION_UNREACHABLE_END";

    /// Fork and join declarations disagree
    pub const INVALID_PAIRING: &str = "ERR_DSL_VALIDATION_INVALID_PAIRING";
}

/// A trait for validators that check specific aspects of the DSL document
pub trait Validator {
    /// Validate the document and return a list of validation errors (if any)
    fn validate(&self, document: &ParsedDocument) -> Vec<ValidationError>;
}

/// Validate a parsed DSL document
pub fn validate_document(document: &ParsedDocument) -> Result<(), DslError> {
    let validators: Vec<Box<dyn Validator>> = vec![
        Box::new(StructureValidator::new()),
        Box::new(ReferenceValidator::new()),
        Box::new(ParallelValidator::new()),
    ];

    let mut errors = Vec::new();
    for validator in validators {
        errors.extend(validator.validate(document));
    }

    if !errors.is_empty() {
        return Err(DslError::from_validation_errors(errors));
    }

    Ok(())
}

/// Path of the activity at `index`, used in error locations
pub(crate) fn activity_path(index: usize) -> String {
    format!("process.activities[{}]", index)
}
