//! Error types for the server.

use thiserror::Error;
use verstream_codec::CodecError;
use verstream_protocol::{ProtocolError, Version};

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Missing, unknown or expired session, or a session for another user.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A version of the batch is already taken.
    #[error("conflict: version {version} already exists")]
    Conflict {
        /// First offending version.
        version: Version,
    },

    /// An external identity is already bound to a user.
    #[error("conflict: identity {google_id} already has a user")]
    UserExists {
        /// The external subject id.
        google_id: String,
    },

    /// A conditional write found an existing row.
    #[error("condition failed on write {index}")]
    ConditionFailed {
        /// Position of the failed write in its transaction.
        index: usize,
    },

    /// Storage engine failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Row encoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::Unauthorized(_) => 401,
            ServerError::Conflict { .. }
            | ServerError::UserExists { .. }
            | ServerError::ConditionFailed { .. } => 409,
            ServerError::Storage(_)
            | ServerError::Codec(_)
            | ServerError::Io(_)
            | ServerError::Internal(_) => 500,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl From<ProtocolError> for ServerError {
    fn from(err: ProtocolError) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(ServerError::InvalidRequest("bad".into()).is_client_error());
        assert!(ServerError::Internal("oops".into()).is_server_error());
        assert!(!ServerError::InvalidRequest("bad".into()).is_server_error());
        assert!(ServerError::Conflict { version: Version(5) }.is_client_error());
    }

    #[test]
    fn status_codes() {
        assert_eq!(ServerError::Unauthorized("expired".into()).status_code(), 401);
        assert_eq!(ServerError::Conflict { version: Version(5) }.status_code(), 409);
        assert_eq!(
            ServerError::from(ProtocolError::MissingVersion { index: 0 }).status_code(),
            400
        );
        assert_eq!(ServerError::Storage("down".into()).status_code(), 500);
    }

    #[test]
    fn error_display() {
        let msg = ServerError::Conflict { version: Version(10) }.to_string();
        assert!(msg.contains("v10"));
    }
}
