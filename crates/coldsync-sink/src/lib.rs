//! # coldsync sink
//!
//! The storage sink: a durable object store that accepts a byte stream under
//! a root-relative key, verifies it against a caller-supplied checksum, and
//! keeps it in a chosen storage class (cold tier by default).
//!
//! ## Overview
//!
//! The reconciler only talks to the [`StorageSink`] trait. [`FsSink`] stores
//! objects under a destination directory with a JSON metadata sidecar per
//! object; [`MemorySink`] keeps them in memory and can be told to fail.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use coldsync_core::Digest;
//! use coldsync_sink::{FsSink, ObjectKey, PutRequest, StorageSink};
//!
//! async fn example() {
//!     let sink = FsSink::new("/mnt/cold").unwrap();
//!     let body = b"hi".to_vec();
//!
//!     let key = ObjectKey::new("docs/a.txt").unwrap();
//!     let request = PutRequest::new(key, std::io::Cursor::new(body), Digest::of(b"hi"));
//!     let receipt = sink.put(request).await.unwrap();
//!     assert_eq!(receipt.size, 2);
//! }
//! ```
//!
//! ## Integrity
//!
//! Every implementation hashes the bytes it actually received and rejects
//! the put with [`SinkError::ChecksumMismatch`] when they do not match the
//! request's checksum. A rejected put leaves nothing stored.

pub mod error;
pub mod fs;
pub mod key;
pub mod sink;
pub mod types;

pub use error::{Result, SinkError};
pub use fs::FsSink;
pub use key::ObjectKey;
pub use sink::{copy_verified, memory::MemorySink, memory::StoredBlob, StorageSink};
pub use types::{
    ByteStream, ObjectMetadata, PutReceipt, PutRequest, StorageClass, StoredObject,
    CONTENT_HASH_METADATA,
};
