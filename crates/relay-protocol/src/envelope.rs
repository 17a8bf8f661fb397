use std::fmt;

use bson::{Bson, Document};

use crate::error::CodecError;

pub const RESULT_KEY: &str = "$result";
pub const ERROR_KEY: &str = "$error";

/// Outcome of one buffered operation: `{ "$result": v }` or `{ "$error": e }`.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Result(Bson),
    Error(RemoteError),
}

impl Envelope {
    /// The envelope sent for an operation name outside the operation table.
    pub fn unknown_operation(name: &str) -> Self {
        Envelope::Error(RemoteError::message(format!("Unknown operation: {name}")))
    }

    pub fn into_result(self) -> Result<Bson, RemoteError> {
        match self {
            Envelope::Result(value) => Ok(value),
            Envelope::Error(err) => Err(err),
        }
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        match self {
            Envelope::Result(value) => doc.insert(RESULT_KEY, value.clone()),
            Envelope::Error(err) => doc.insert(ERROR_KEY, err.to_bson()),
        };
        doc
    }

    /// Parse a decoded envelope document. Exactly one of the two tags must
    /// be present and nothing else.
    pub fn from_document(mut doc: Document) -> Result<Self, CodecError> {
        if doc.len() != 1 {
            return Err(CodecError::InvalidEnvelope(format!(
                "expected exactly one of {RESULT_KEY} or {ERROR_KEY}, found {} keys",
                doc.len()
            )));
        }
        if let Some(value) = doc.remove(RESULT_KEY) {
            return Ok(Envelope::Result(value));
        }
        match doc.remove(ERROR_KEY) {
            Some(err) => RemoteError::from_bson(err).map(Envelope::Error),
            None => Err(CodecError::InvalidEnvelope(format!(
                "expected {RESULT_KEY} or {ERROR_KEY}"
            ))),
        }
    }
}

/// An error raised on the gateway, reconstructed on the client.
///
/// `name` is absent when the gateway only sent a message string (the form
/// used for unknown operations).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteError {
    pub name: Option<String>,
    pub message: String,
    pub stack: Option<String>,
}

impl RemoteError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            message: message.into(),
            stack: None,
        }
    }

    pub fn message(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            stack: None,
        }
    }

    /// Capture `err` under `name`, recording its `source()` chain as the stack.
    pub fn from_error(name: impl Into<String>, err: &(dyn std::error::Error + 'static)) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            causes.push(format!("caused by: {cause}"));
            source = cause.source();
        }

        Self {
            name: Some(name.into()),
            message: err.to_string(),
            stack: (!causes.is_empty()).then(|| causes.join("\n")),
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or("Error")
    }

    fn to_bson(&self) -> Bson {
        if self.name.is_none() && self.stack.is_none() {
            return Bson::String(self.message.clone());
        }

        let mut doc = Document::new();
        if let Some(name) = &self.name {
            doc.insert("name", name.clone());
        }
        doc.insert("message", self.message.clone());
        if let Some(stack) = &self.stack {
            doc.insert("stack", stack.clone());
        }
        Bson::Document(doc)
    }

    fn from_bson(value: Bson) -> Result<Self, CodecError> {
        match value {
            Bson::String(message) => Ok(RemoteError::message(message)),
            Bson::Document(doc) => {
                let message = match doc.get("message") {
                    Some(Bson::String(m)) => m.clone(),
                    Some(_) => {
                        return Err(CodecError::InvalidEnvelope(
                            "error message must be a string".into(),
                        ));
                    }
                    None => String::new(),
                };
                Ok(RemoteError {
                    name: optional_string(&doc, "name")?,
                    message,
                    stack: optional_string(&doc, "stack")?,
                })
            }
            _ => Err(CodecError::InvalidEnvelope(
                "error must be a string or a document".into(),
            )),
        }
    }
}

fn optional_string(doc: &Document, key: &str) -> Result<Option<String>, CodecError> {
    match doc.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(CodecError::InvalidEnvelope(format!(
            "error {key} must be a string"
        ))),
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message)
    }
}

impl std::error::Error for RemoteError {}
