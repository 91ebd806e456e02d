//! # coldsync
//!
//! Incremental backup of a directory tree into cold-tier object storage.
//!
//! ## Overview
//!
//! Each run walks the tree depth-first and, for every regular file:
//!
//! - computes a BLAKE3 digest of its content,
//! - compares size, modification time and digest against the inventory,
//! - uploads it only when something changed, with the digest as the
//!   integrity checksum the sink must verify,
//! - records it as uploaded only after the sink confirmed the upload.
//!
//! A failed file leaves its inventory record exactly as it was. By default
//! the first failure stops the run ([`FailurePolicy::Halt`]).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coldsync::{Reconciler, ReconcilerConfig};
//! use coldsync::sink::FsSink;
//! use coldsync::store::SqliteInventory;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let inventory = SqliteInventory::open("inventory.db")?;
//!     let sink = FsSink::new("/mnt/cold")?;
//!
//!     let reconciler = Reconciler::new(
//!         Arc::new(inventory),
//!         Arc::new(sink),
//!         "/srv/photos",
//!         ReconcilerConfig::default(),
//!     );
//!     let report = reconciler.run().await?;
//!     println!("{} uploaded, {} unchanged", report.uploaded, report.unchanged);
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `coldsync::core` - digests, file records, change detection
//! - `coldsync::store` - inventory trait, SQLite and in-memory inventories
//! - `coldsync::sink` - storage sink trait, filesystem and in-memory sinks

pub mod digest;
pub mod error;
pub mod logging;
pub mod reconciler;
pub mod settings;
pub mod walker;

// Re-export component crates
pub use coldsync_core as core;
pub use coldsync_sink as sink;
pub use coldsync_store as store;

pub use digest::{digest_file, digest_reader};
pub use error::{EngineError, FileError, Result};
pub use reconciler::{
    FailedFile, FailurePolicy, FileOutcome, Reconciler, ReconcilerConfig, RunReport,
};
pub use settings::{Settings, SettingsOverrides};
pub use walker::{FileEntry, UnsupportedEntry, WalkItem, Walker, WalkerConfig};
