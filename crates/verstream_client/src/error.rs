//! Error types for the client.

use std::sync::Arc;
use thiserror::Error;
use verstream_codec::CodecError;
use verstream_protocol::ProtocolError;

/// Result type for client operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while loading or appending versions.
///
/// Cloneable so that one batch result can be handed to every caller whose
/// entities were part of the batch.
#[derive(Error, Debug, Clone)]
pub enum SyncError {
    /// A version is already taken, locally or on the server.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The stream does not accept writes.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Missing, expired or rejected credentials.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Malformed request or response.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local record encoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Local I/O failure.
    #[error("io error: {0}")]
    Io(Arc<std::io::Error>),

    /// An operation did not finish in time.
    #[error("operation timed out")]
    Timeout,

    /// The store or replica was used before `init`.
    #[error("not initialized")]
    NotInitialized,

    /// A background task has shut down.
    #[error("stream closed")]
    Closed,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }

    /// Returns true if a version was already taken.
    pub fn is_conflict(&self) -> bool {
        matches!(self, SyncError::Conflict(_))
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(Arc::new(err))
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        SyncError::Protocol(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Protocol(err.to_string())
    }
}
