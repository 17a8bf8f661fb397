use std::fmt;

use relay_protocol::OptionsError;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// An insert or upsert collided with an existing `_id`.
    DuplicateKey(String),
    InvalidFilter(String),
    InvalidUpdate(String),
    InvalidOptions(String),
    Storage(String),
}

impl StoreError {
    /// Error name reported to remote callers.
    pub fn name(&self) -> &'static str {
        match self {
            StoreError::DuplicateKey(_) => "DuplicateKeyError",
            StoreError::InvalidFilter(_) => "InvalidFilterError",
            StoreError::InvalidUpdate(_) => "InvalidUpdateError",
            StoreError::InvalidOptions(_) => "InvalidOptionsError",
            StoreError::Storage(_) => "StorageError",
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateKey(id) => write!(f, "duplicate key error: _id {id}"),
            StoreError::InvalidFilter(msg) => write!(f, "invalid filter: {msg}"),
            StoreError::InvalidUpdate(msg) => write!(f, "invalid update: {msg}"),
            StoreError::InvalidOptions(msg) => write!(f, "invalid options: {msg}"),
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<OptionsError> for StoreError {
    fn from(e: OptionsError) -> Self {
        StoreError::InvalidOptions(e.0)
    }
}

impl From<crate::filter::FilterParseError> for StoreError {
    fn from(e: crate::filter::FilterParseError) -> Self {
        StoreError::InvalidFilter(e.0)
    }
}

impl From<crate::mutation::UpdateError> for StoreError {
    fn from(e: crate::mutation::UpdateError) -> Self {
        StoreError::InvalidUpdate(e.0)
    }
}
