//! In-memory implementation of the Inventory trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use coldsync_core::FileRecord;

use crate::error::{Result, StoreError};
use crate::traits::{Inventory, UpsertResult};

/// In-memory inventory implementation.
///
/// All data is lost when the inventory is dropped. Thread-safe via RwLock.
pub struct MemoryInventory {
    /// Records keyed by path.
    records: RwLock<BTreeMap<String, FileRecord>>,
}

impl MemoryInventory {
    /// Create a new empty in-memory inventory.
    pub fn new() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create an inventory pre-populated with records.
    pub fn with_records(records: impl IntoIterator<Item = FileRecord>) -> Self {
        Self {
            records: RwLock::new(records.into_iter().map(|r| (r.path.clone(), r)).collect()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, FileRecord>>> {
        self.records
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, FileRecord>>> {
        self.records
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryInventory {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Inventory for MemoryInventory {
    async fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        Ok(self.read()?.get(path).cloned())
    }

    async fn upsert(&self, record: &FileRecord) -> Result<()> {
        self.write()?.insert(record.path.clone(), record.clone());
        Ok(())
    }

    async fn compare_and_upsert(
        &self,
        expected: Option<&FileRecord>,
        record: &FileRecord,
    ) -> Result<UpsertResult> {
        let mut records = self.write()?;

        let current = records.get(&record.path);
        if current != expected {
            return Ok(UpsertResult::Conflict {
                current: current.cloned(),
            });
        }

        records.insert(record.path.clone(), record.clone());
        Ok(UpsertResult::Written)
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        Ok(self.read()?.values().cloned().collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldsync_core::{Digest, FileStat};

    fn make_record(path: &str, content: &[u8]) -> FileRecord {
        FileRecord::uploaded(
            path,
            FileStat {
                size: content.len() as u64,
                modified_ms: 1_700_000_000_000,
            },
            Digest::of(content),
        )
    }

    #[tokio::test]
    async fn test_memory_inventory_basic() {
        let inventory = MemoryInventory::new();
        let record = make_record("/root/a.txt", b"hi");

        assert_eq!(inventory.get("/root/a.txt").await.unwrap(), None);

        inventory.upsert(&record).await.unwrap();
        assert_eq!(inventory.get("/root/a.txt").await.unwrap(), Some(record));
        assert_eq!(inventory.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_inventory_upsert_replaces() {
        let inventory = MemoryInventory::new();
        inventory.upsert(&make_record("/root/a.txt", b"hi")).await.unwrap();

        let updated = make_record("/root/a.txt", b"hello");
        inventory.upsert(&updated).await.unwrap();

        assert_eq!(inventory.count().await.unwrap(), 1);
        assert_eq!(inventory.get("/root/a.txt").await.unwrap(), Some(updated));
    }

    #[tokio::test]
    async fn test_memory_inventory_compare_and_upsert() {
        let inventory = MemoryInventory::new();
        let first = make_record("/root/a.txt", b"hi");

        // Absent, expected absent: written.
        let r = inventory.compare_and_upsert(None, &first).await.unwrap();
        assert_eq!(r, UpsertResult::Written);

        // Present, expected absent: conflict, nothing changes.
        let second = make_record("/root/a.txt", b"hello");
        let r = inventory.compare_and_upsert(None, &second).await.unwrap();
        assert_eq!(
            r,
            UpsertResult::Conflict {
                current: Some(first.clone())
            }
        );
        assert_eq!(inventory.get("/root/a.txt").await.unwrap(), Some(first.clone()));

        // Present, expected matches: written.
        let r = inventory
            .compare_and_upsert(Some(&first), &second)
            .await
            .unwrap();
        assert_eq!(r, UpsertResult::Written);
        assert_eq!(inventory.get("/root/a.txt").await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_memory_inventory_list_is_ordered() {
        let inventory = MemoryInventory::with_records([
            make_record("/root/z.txt", b"z"),
            make_record("/root/a.txt", b"a"),
            make_record("/root/m/b.txt", b"b"),
        ]);

        let paths: Vec<String> = inventory
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.path)
            .collect();
        assert_eq!(paths, vec!["/root/a.txt", "/root/m/b.txt", "/root/z.txt"]);
    }
}
