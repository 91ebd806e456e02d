//! Error types for the sink module.

use coldsync_core::Digest;
use thiserror::Error;

/// Errors that can occur while storing an object.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The received bytes do not hash to the request's checksum.
    #[error("checksum mismatch for {key}: expected {expected}, received {actual}")]
    ChecksumMismatch {
        key: String,
        expected: Digest,
        actual: Digest,
    },

    /// Object key is empty, absolute, or escapes the destination.
    #[error("invalid object key: {0}")]
    InvalidKey(String),

    /// The backend refused the object (quota, throttling, policy).
    #[error("rejected by sink: {0}")]
    Rejected(String),

    /// Unknown storage class name.
    #[error("unknown storage class: {0}")]
    UnknownStorageClass(String),

    /// Object metadata could not be encoded or decoded.
    #[error("metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sink operations.
pub type Result<T> = std::result::Result<T, SinkError>;
