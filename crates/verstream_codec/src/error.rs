//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur during encoding or decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Failed to encode a value.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode bytes.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// Description of the decoding error.
        message: String,
    },

    /// A sort key does not follow the length-prefixed decimal layout.
    #[error("invalid sort key: {key:?}")]
    InvalidSortKey {
        /// The offending key.
        key: String,
    },

    /// A record frame failed its checksum.
    #[error("checksum mismatch at offset {offset}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Offset of the frame header.
        offset: usize,
        /// Checksum stored in the frame.
        expected: u32,
        /// Checksum computed over the payload.
        actual: u32,
    },

    /// Input ended in the middle of a frame.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof {
        /// Offset of the incomplete frame.
        offset: usize,
    },
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid sort key error.
    pub fn invalid_sort_key(key: impl Into<String>) -> Self {
        Self::InvalidSortKey { key: key.into() }
    }

    /// Returns true if the error describes a damaged or incomplete frame,
    /// as left behind by an interrupted append.
    pub fn is_torn_frame(&self) -> bool {
        matches!(
            self,
            CodecError::ChecksumMismatch { .. } | CodecError::UnexpectedEof { .. }
        )
    }
}
