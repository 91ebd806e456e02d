//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use coldsync_core::FileRecord;
use coldsync_store::{Inventory, Result, UpsertResult};
use tempfile::TempDir;

/// A scratch directory tree that is removed on drop.
pub struct TreeFixture {
    dir: TempDir,
    root: PathBuf,
}

impl TreeFixture {
    /// Create an empty tree.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let root = dir
            .path()
            .canonicalize()
            .expect("failed to canonicalize temp dir");
        Self { dir, root }
    }

    /// Canonical root of the tree.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of `rel` under the root.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Inventory key of `rel`.
    pub fn inventory_key(&self, rel: &str) -> String {
        self.path(rel).to_string_lossy().into_owned()
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        fs::write(&path, contents).expect("failed to write file");
        path
    }

    /// Create an empty directory.
    pub fn mkdir(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).expect("failed to create dir");
        path
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path(rel)).expect("failed to remove file");
    }

    /// Current modification time of `rel`.
    pub fn mtime(&self, rel: &str) -> SystemTime {
        fs::metadata(self.path(rel))
            .and_then(|m| m.modified())
            .expect("failed to read mtime")
    }

    /// Set the modification time of `rel`.
    pub fn set_mtime(&self, rel: &str, time: SystemTime) {
        let file = fs::File::options()
            .write(true)
            .open(self.path(rel))
            .expect("failed to open file");
        file.set_modified(time).expect("failed to set mtime");
    }

    /// Move the modification time of `rel` forward by `by`.
    pub fn touch_forward(&self, rel: &str, by: Duration) {
        let time = self.mtime(rel) + by;
        self.set_mtime(rel, time);
    }

    /// Replace the content of `rel` keeping its modification time.
    pub fn rewrite_preserving_mtime(&self, rel: &str, contents: impl AsRef<[u8]>) {
        let time = self.mtime(rel);
        self.write(rel, contents);
        self.set_mtime(rel, time);
    }

    /// The underlying temp dir.
    pub fn temp_dir(&self) -> &TempDir {
        &self.dir
    }
}

impl Default for TreeFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Inventory wrapper that records every call before delegating.
pub struct CountingInventory<I> {
    inner: I,
    gets: Mutex<Vec<String>>,
    writes: Mutex<Vec<String>>,
}

impl<I: Inventory> CountingInventory<I> {
    pub fn new(inner: I) -> Self {
        Self {
            inner,
            gets: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// Paths looked up, in call order.
    pub fn gets(&self) -> Vec<String> {
        self.gets.lock().expect("lock poisoned").clone()
    }

    /// Paths written (plain or conditional), in call order.
    pub fn writes(&self) -> Vec<String> {
        self.writes.lock().expect("lock poisoned").clone()
    }

    pub fn reset(&self) {
        self.gets.lock().expect("lock poisoned").clear();
        self.writes.lock().expect("lock poisoned").clear();
    }

    fn record_write(&self, path: &str) {
        self.writes
            .lock()
            .expect("lock poisoned")
            .push(path.to_string());
    }
}

#[async_trait]
impl<I: Inventory> Inventory for CountingInventory<I> {
    async fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        self.gets
            .lock()
            .expect("lock poisoned")
            .push(path.to_string());
        self.inner.get(path).await
    }

    async fn upsert(&self, record: &FileRecord) -> Result<()> {
        self.record_write(&record.path);
        self.inner.upsert(record).await
    }

    async fn compare_and_upsert(
        &self,
        expected: Option<&FileRecord>,
        record: &FileRecord,
    ) -> Result<UpsertResult> {
        self.record_write(&record.path);
        self.inner.compare_and_upsert(expected, record).await
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        self.inner.list().await
    }

    async fn count(&self) -> Result<u64> {
        self.inner.count().await
    }
}
