use crate::error::DslError;
use crate::process::ParsedDocument;

/// DSL version accepted by this parser
pub const SUPPORTED_DSL_VERSION: &str = "1.0";

/// Parse a YAML string into a ParsedDocument.
///
/// Only YAML syntax and the DSL version are checked here. Structure and
/// references are handled separately by the validation module.
pub fn parse_dsl_document(yaml_str: &str) -> Result<ParsedDocument, DslError> {
    let document: ParsedDocument = serde_yaml::from_str(yaml_str)?;

    if document.dsl_version != SUPPORTED_DSL_VERSION {
        return Err(DslError::UnsupportedVersion(document.dsl_version.clone()));
    }

    Ok(document)
}
