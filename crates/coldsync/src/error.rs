//! Error types for backup runs.

use std::path::PathBuf;
use std::time::Duration;

use coldsync_sink::SinkError;
use coldsync_store::StoreError;
use thiserror::Error;

use crate::reconciler::RunReport;
use crate::walker::UnsupportedEntry;

/// A failure confined to one file. Fails the run under the halt policy.
#[derive(Debug, Error)]
pub enum FileError {
    /// The file could not be read for hashing or upload.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The sink refused or failed to store the object.
    #[error("upload failed: {0}")]
    Sink(#[from] SinkError),

    /// The file's name cannot be used as an object key.
    #[error("cannot back up {0}")]
    Unsupported(#[from] UnsupportedEntry),

    /// The upload did not finish in time.
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that end a backup run.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The inventory could not be read or written.
    #[error("inventory error: {0}")]
    Inventory(#[from] StoreError),

    /// The inventory record changed between lookup and write.
    #[error("inventory record for {path} changed during the run")]
    InventoryConflict { path: String },

    /// The backup root is missing or unusable.
    #[error("backup root {}: {reason}", path.display())]
    Root { path: PathBuf, reason: String },

    /// A file failed and the failure policy stopped the run.
    #[error("backup aborted at {path}: {source}")]
    Aborted {
        path: String,
        #[source]
        source: FileError,
        /// What the run got done before stopping.
        report: Box<RunReport>,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A blocking task panicked or was cancelled.
    #[error("internal task failed: {0}")]
    Task(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(e: config::ConfigError) -> Self {
        EngineError::Config(e.to_string())
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
