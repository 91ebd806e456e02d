//! # coldsync core
//!
//! Pure primitives for coldsync: content digests, inventory records, and the
//! change-detection predicate that decides whether a file needs uploading.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Digest`] - 32-byte BLAKE3 content digest (fingerprint and upload checksum)
//! - [`FileRecord`] - The inventory's last-known state of one file
//! - [`FileStat`] - Live filesystem size and modification time
//! - [`ChangeReason`] - Why a file does (or does not) need uploading

pub mod error;
pub mod record;
pub mod types;

pub use error::CoreError;
pub use record::{needs_upload, ChangeReason, FileRecord, FileStat};
pub use types::{Digest, DIGEST_LEN};
