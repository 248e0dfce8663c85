use thiserror::Error;

/// Errors raised while encoding or decoding artifact snapshots
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The underlying XML writer or reader failed
    #[error("XML error: {0}")]
    Xml(String),

    /// One artifact entry could not be read
    #[error("Malformed artifact: {0}")]
    MalformedArtifact(String),
}

impl From<quick_xml::Error> for CodecError {
    fn from(err: quick_xml::Error) -> Self {
        CodecError::Xml(err.to_string())
    }
}

impl From<std::io::Error> for CodecError {
    fn from(err: std::io::Error) -> Self {
        CodecError::Xml(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for CodecError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        CodecError::MalformedArtifact(err.to_string())
    }
}
