//! Sink abstraction for storing file contents.
//!
//! The sink layer handles durable object storage. Implementations may target
//! a local directory, an object store, or anything that can verify a
//! checksum and keep bytes in a storage class.

use async_trait::async_trait;
use coldsync_core::Digest;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, SinkError};
use crate::types::{PutReceipt, PutRequest};

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Storage sink trait for durable object storage.
///
/// Implementations must be thread-safe (Send + Sync) and must verify the
/// request checksum against the bytes they received, rejecting on mismatch.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Store one object.
    ///
    /// Returns only once the object is durably accepted. On any error the
    /// object must not be visible under `request.key`.
    async fn put(&self, request: PutRequest) -> Result<PutReceipt>;
}

#[async_trait]
impl<T: StorageSink + ?Sized> StorageSink for std::sync::Arc<T> {
    async fn put(&self, request: PutRequest) -> Result<PutReceipt> {
        (**self).put(request).await
    }
}

/// Copy `reader` into `writer`, hashing the bytes on the way through.
///
/// Returns the number of bytes copied, or [`SinkError::ChecksumMismatch`]
/// when the copied bytes do not hash to `expected`. The writer is flushed
/// either way; callers discard it on error.
pub async fn copy_verified<R, W>(
    key: &str,
    reader: &mut R,
    writer: &mut W,
    expected: &Digest,
) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n]).await?;
        total += n as u64;
    }
    writer.flush().await?;

    let actual = Digest::from(hasher.finalize());
    if actual != *expected {
        return Err(SinkError::ChecksumMismatch {
            key: key.to_string(),
            expected: *expected,
            actual,
        });
    }

    Ok(total)
}

/// A simple in-memory sink for testing.
///
/// Stores objects in a map, records every put attempt in order, and can be
/// armed to reject puts for chosen keys.
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, HashSet};
    use std::sync::{Mutex, MutexGuard};

    use bytes::Bytes;

    use crate::key::ObjectKey;
    use crate::types::{ObjectMetadata, StorageClass};

    /// An object held by [`MemorySink`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct StoredBlob {
        pub bytes: Bytes,
        pub checksum: Digest,
        pub metadata: ObjectMetadata,
        pub storage_class: StorageClass,
    }

    #[derive(Default)]
    struct MemorySinkInner {
        objects: BTreeMap<ObjectKey, StoredBlob>,
        /// Every put call, in order, including failed ones.
        attempts: Vec<ObjectKey>,
        fail_keys: HashSet<String>,
        fail_all: Option<String>,
    }

    /// In-memory sink implementation.
    #[derive(Default)]
    pub struct MemorySink {
        inner: Mutex<MemorySinkInner>,
    }

    impl MemorySink {
        /// Create a new empty sink.
        pub fn new() -> Self {
            Self::default()
        }

        fn lock(&self) -> MutexGuard<'_, MemorySinkInner> {
            self.inner.lock().unwrap_or_else(|e| e.into_inner())
        }

        /// Reject every future put for `key`.
        pub fn fail_on(&self, key: &str) {
            self.lock().fail_keys.insert(key.to_string());
        }

        /// Reject every future put with `reason`.
        pub fn fail_all(&self, reason: &str) {
            self.lock().fail_all = Some(reason.to_string());
        }

        /// Stop injecting failures.
        pub fn clear_failures(&self) {
            let mut inner = self.lock();
            inner.fail_keys.clear();
            inner.fail_all = None;
        }

        /// Number of put calls, successful or not.
        pub fn put_attempts(&self) -> usize {
            self.lock().attempts.len()
        }

        /// Keys of every put call, in call order.
        pub fn attempted_keys(&self) -> Vec<String> {
            self.lock()
                .attempts
                .iter()
                .map(|k| k.as_str().to_string())
                .collect()
        }

        /// Forget recorded attempts, keeping stored objects.
        pub fn reset_attempts(&self) {
            self.lock().attempts.clear();
        }

        /// A stored object by key.
        pub fn object(&self, key: &str) -> Option<StoredBlob> {
            let key = ObjectKey::new(key).ok()?;
            self.lock().objects.get(&key).cloned()
        }

        /// Keys of all stored objects, sorted.
        pub fn keys(&self) -> Vec<String> {
            self.lock()
                .objects
                .keys()
                .map(|k| k.as_str().to_string())
                .collect()
        }

        pub fn len(&self) -> usize {
            self.lock().objects.len()
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait]
    impl StorageSink for MemorySink {
        async fn put(&self, mut request: PutRequest) -> Result<PutReceipt> {
            {
                let mut inner = self.lock();
                inner.attempts.push(request.key.clone());

                if let Some(reason) = &inner.fail_all {
                    return Err(SinkError::Rejected(reason.clone()));
                }
                if inner.fail_keys.contains(request.key.as_str()) {
                    return Err(SinkError::Rejected(format!(
                        "injected failure for {}",
                        request.key
                    )));
                }
            }

            let mut body = Vec::new();
            let size = copy_verified(
                request.key.as_str(),
                &mut request.content,
                &mut body,
                &request.checksum,
            )
            .await?;

            self.lock().objects.insert(
                request.key.clone(),
                StoredBlob {
                    bytes: Bytes::from(body),
                    checksum: request.checksum,
                    metadata: request.metadata,
                    storage_class: request.storage_class,
                },
            );

            Ok(PutReceipt {
                key: request.key,
                size,
                checksum: request.checksum,
                storage_class: request.storage_class,
            })
        }
    }
}
