//! Error types for coldsync core.

use thiserror::Error;

/// Errors from parsing or constructing core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid digest length: expected {expected} bytes, got {got}")]
    InvalidDigestLength { expected: usize, got: usize },
}
