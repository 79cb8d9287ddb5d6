//! Error types for the protocol crate.

use thiserror::Error;

/// Protocol error type covering wire-level failure modes.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Failed to serialize a message.
    #[error("serialization failed: {0}")]
    Encode(String),

    /// Failed to parse an inbound message.
    #[error("decode failed: {0}")]
    Decode(String),

    /// A PIN was not six ASCII digits.
    #[error("invalid PIN: {0:?}")]
    InvalidPin(String),

    /// Upload or download content used a malformed encoding.
    #[error("invalid file content encoding: {0}")]
    InvalidUploadPayload(String),
}

/// Result type alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_data() || err.is_eof() || err.is_syntax() {
            ProtocolError::Decode(err.to_string())
        } else {
            ProtocolError::Encode(err.to_string())
        }
    }
}
