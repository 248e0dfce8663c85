//! Content format of the yes/no artifact recorded by conditional activities:
//! a single `<value>` element holding `true` or `false`.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::error::CodecError;

const TAG_VALUE: &[u8] = b"value";

/// Encode a conditional answer
pub fn encode_boolean_value(value: bool) -> Vec<u8> {
    format!("<value>{}</value>", value).into_bytes()
}

/// Extract the conditional answer from an artifact's content.
///
/// Malformed content is reported as `false`; the error is only logged.
pub fn decode_boolean_value(content: &[u8]) -> bool {
    match try_decode_boolean_value(content) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "Conditional artifact content unreadable, using false");
            false
        }
    }
}

/// Strict variant of [`decode_boolean_value`]
pub fn try_decode_boolean_value(content: &[u8]) -> Result<bool, CodecError> {
    let mut reader = Reader::from_reader(content);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut in_value = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == TAG_VALUE => in_value = true,
            Event::Empty(e) if e.name().as_ref() == TAG_VALUE => {
                return Err(CodecError::MalformedArtifact(
                    "conditional value element is empty".to_string(),
                ));
            }
            Event::Text(text) if in_value => {
                let text = text.unescape()?;
                return parse_literal(&text);
            }
            Event::CData(cdata) if in_value => {
                let raw = cdata.into_inner();
                let text = std::str::from_utf8(&raw)
                    .map_err(|e| CodecError::MalformedArtifact(e.to_string()))?;
                return parse_literal(text);
            }
            Event::End(e) if in_value && e.name().as_ref() == TAG_VALUE => {
                return Err(CodecError::MalformedArtifact(
                    "conditional value element is empty".to_string(),
                ));
            }
            Event::Eof => {
                return Err(CodecError::MalformedArtifact(
                    "conditional value element not found".to_string(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }
}

fn parse_literal(text: &str) -> Result<bool, CodecError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if text.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(CodecError::MalformedArtifact(format!(
            "'{}' is not a boolean literal",
            text
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_values_decode_back() {
        assert!(decode_boolean_value(&encode_boolean_value(true)));
        assert!(!decode_boolean_value(&encode_boolean_value(false)));
    }

    #[test]
    fn test_value_nested_in_larger_document() {
        let content = br#"<?xml version="1.0"?><answer><value> TRUE </value></answer>"#;
        assert_eq!(try_decode_boolean_value(content), Ok(true));
    }

    #[test]
    fn test_cdata_value() {
        let content = b"<value><![CDATA[true]]></value>";
        assert!(decode_boolean_value(content));
    }

    #[test]
    fn test_malformed_content_is_false() {
        assert!(!decode_boolean_value(b"<value>maybe</value>"));
        assert!(!decode_boolean_value(b"<other>true</other>"));
        assert!(!decode_boolean_value(b"<value></value>"));
        assert!(!decode_boolean_value(b"<value/>"));
        assert!(!decode_boolean_value(b"not xml at all"));
        assert!(!decode_boolean_value(b""));
    }

    #[test]
    fn test_strict_variant_reports_errors() {
        match try_decode_boolean_value(b"<value>maybe</value>") {
            Err(CodecError::MalformedArtifact(msg)) => assert!(msg.contains("maybe")),
            other => panic!("Expected MalformedArtifact, got {:?}", other),
        }
    }
}
