//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while interpreting wire payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload is not valid JSON or does not match the expected shape.
    #[error("invalid JSON: {message}")]
    Json {
        /// Description of the parse error.
        message: String,
    },

    /// A log element is not a JSON object.
    #[error("element {index} is not an object")]
    NotAnObject {
        /// Position of the element in its batch.
        index: usize,
    },

    /// A log element has no `version` field.
    #[error("element {index} has no version")]
    MissingVersion {
        /// Position of the element in its batch.
        index: usize,
    },

    /// A log element's `version` is not a non-negative integer.
    #[error("element {index} has invalid version {value}")]
    InvalidVersion {
        /// Position of the element in its batch.
        index: usize,
        /// The offending value, as JSON text.
        value: String,
    },
}

impl ProtocolError {
    /// Create a JSON error.
    pub fn json(message: impl Into<String>) -> Self {
        Self::Json {
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::json(err.to_string())
    }
}
