use regex::Regex;
use lazy_static::lazy_static;

lazy_static! {
    // Activity, actor and artifact definition identifiers
    static ref IDENTIFIER_REGEX: Regex = Regex::new(r"^[A-Za-z0-9_.:\-]+$").unwrap();
}

/// Check whether an identifier uses only the allowed characters.
///
/// Valid identifiers include:
/// - "survey"
/// - "site-survey_2"
/// - "provisioning:fork.1"
pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER_REGEX.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        for id in ["survey", "site-survey_2", "provisioning:fork.1", "A"] {
            assert!(is_valid_identifier(id), "expected '{}' to be valid", id);
        }
    }

    #[test]
    fn test_invalid_identifiers() {
        for id in ["", "has space", "slash/id", "tab\tid", "ünïcode"] {
            assert!(!is_valid_identifier(id), "expected '{}' to be invalid", id);
        }
    }
}
