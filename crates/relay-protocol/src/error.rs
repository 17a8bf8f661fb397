use std::fmt;

/// Failure converting between domain values and their wire form.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// The value contains a kind the wire form has no tag for.
    Unsupported(String),
    /// The bytes are not valid JSON / BSON.
    Syntax(String),
    /// A reserved tag carried a payload of the wrong shape.
    InvalidTag { tag: &'static str, message: String },
    InvalidEnvelope(String),
    /// A record stream ended in the middle of a record.
    Truncated,
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::Unsupported(kind) => write!(f, "unsupported value kind: {kind}"),
            CodecError::Syntax(msg) => write!(f, "malformed payload: {msg}"),
            CodecError::InvalidTag { tag, message } => write!(f, "invalid {tag} value: {message}"),
            CodecError::InvalidEnvelope(msg) => write!(f, "invalid envelope: {msg}"),
            CodecError::Truncated => write!(f, "record stream ended inside a record"),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<serde_json::Error> for CodecError {
    fn from(e: serde_json::Error) -> Self {
        CodecError::Syntax(e.to_string())
    }
}

impl From<bson::error::Error> for CodecError {
    fn from(e: bson::error::Error) -> Self {
        CodecError::Syntax(e.to_string())
    }
}

/// An option or argument document that does not fit its operation.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionsError(pub String);

impl fmt::Display for OptionsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid options: {}", self.0)
    }
}

impl std::error::Error for OptionsError {}
