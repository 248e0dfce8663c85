use thiserror::Error;
use crate::validation::ValidationError;
use std::fmt;

/// All possible errors that can occur while reading a process definition source
#[derive(Error, Debug)]
pub enum DslError {
    /// Errors that occur during YAML parsing
    #[error("YAML parsing error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// A single validation error
    #[error("Validation error: {0}")]
    ValidationError(#[from] ValidationError),

    /// Multiple validation errors
    #[error("{}", MultipleErrorsFormat(.0))]
    MultipleValidationErrors(Vec<ValidationError>),

    /// Unsupported DSL version
    #[error("Unsupported DSL version: {0}")]
    UnsupportedVersion(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

// Helper struct to format multiple errors
struct MultipleErrorsFormat<'a>(&'a [ValidationError]);

impl fmt::Display for MultipleErrorsFormat<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multiple validation errors ({} issues):", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

impl DslError {
    /// Create a DslError from one or more validation errors
    pub fn from_validation_errors(mut errors: Vec<ValidationError>) -> Self {
        if errors.len() > 1 {
            return DslError::MultipleValidationErrors(errors);
        }
        match errors.pop() {
            Some(err) => DslError::ValidationError(err),
            None => DslError::InternalError(
                "Called from_validation_errors with empty vector".to_string(),
            ),
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            DslError::YamlError(_) => "ERR_DSL_YAML_PARSE",
            DslError::ValidationError(err) => err.code,
            DslError::MultipleValidationErrors(_) => "ERR_DSL_VALIDATION_MULTIPLE",
            DslError::UnsupportedVersion(_) => "ERR_DSL_UNSUPPORTED_VERSION",
            DslError::InternalError(_) => "ERR_DSL_INTERNAL",
        }
    }

    /// Every validation error carried by this error (empty for parse failures)
    pub fn validation_errors(&self) -> Vec<&ValidationError> {
        match self {
            DslError::ValidationError(err) => vec![err],
            DslError::MultipleValidationErrors(errors) => errors.iter().collect(),
            _ => Vec::new(),
        }
    }

    /// Whether any carried validation error has the given code
    pub fn has_code(&self, code: &str) -> bool {
        self.error_code() == code || self.validation_errors().iter().any(|err| err.code == code)
    }
}
