//! Inventory trait: the abstract interface for file record persistence.
//!
//! This trait keeps the reconciler storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use coldsync_core::FileRecord;

use crate::error::Result;

/// Result of a conditional upsert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertResult {
    /// The record was written.
    Written,
    /// The stored record no longer matched the expected one; nothing written.
    Conflict {
        /// What is stored now (`None` if absent).
        current: Option<FileRecord>,
    },
}

/// The Inventory trait: async interface for file record persistence.
///
/// All methods are async so blocking backends (SQLite) can move work off
/// the runtime with `spawn_blocking`.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Look up the record for a path.
    async fn get(&self, path: &str) -> Result<Option<FileRecord>>;

    /// Insert or replace the record for `record.path`.
    async fn upsert(&self, record: &FileRecord) -> Result<()>;

    /// Atomically write `record` only if the stored record for its path
    /// equals `expected` (`None` meaning "no record").
    ///
    /// The read and the write happen under one lock or transaction, so a
    /// concurrent writer cannot slip in between.
    async fn compare_and_upsert(
        &self,
        expected: Option<&FileRecord>,
        record: &FileRecord,
    ) -> Result<UpsertResult>;

    /// All records, ordered by path.
    async fn list(&self) -> Result<Vec<FileRecord>>;

    /// Number of records.
    async fn count(&self) -> Result<u64>;
}

#[async_trait]
impl<T: Inventory + ?Sized> Inventory for std::sync::Arc<T> {
    async fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        (**self).get(path).await
    }

    async fn upsert(&self, record: &FileRecord) -> Result<()> {
        (**self).upsert(record).await
    }

    async fn compare_and_upsert(
        &self,
        expected: Option<&FileRecord>,
        record: &FileRecord,
    ) -> Result<UpsertResult> {
        (**self).compare_and_upsert(expected, record).await
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        (**self).list().await
    }

    async fn count(&self) -> Result<u64> {
        (**self).count().await
    }
}
