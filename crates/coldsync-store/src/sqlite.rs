//! SQLite implementation of the Inventory trait.
//!
//! This is the primary inventory backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};

use coldsync_core::{Digest, FileRecord};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::{Inventory, UpsertResult};

/// SQLite-based inventory implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteInventory {
    /// The SQLite connection, protected by a mutex.
    conn: Arc<Mutex<Connection>>,
}

impl SqliteInventory {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

const SELECT_COLUMNS: &str = "SELECT path, size, modified_ms, hash, uploaded FROM files";

// Helper to convert a row to FileRecord
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let size: i64 = row.get("size")?;
    let hash_bytes: Vec<u8> = row.get("hash")?;

    let size = u64::try_from(size)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Integer, Box::new(e)))?;
    let hash = Digest::try_from(hash_bytes.as_slice())
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Blob, Box::new(e)))?;

    Ok(FileRecord {
        path: row.get("path")?,
        size,
        modified_ms: row.get("modified_ms")?,
        hash,
        uploaded: row.get("uploaded")?,
    })
}

fn query_record(conn: &Connection, path: &str) -> Result<Option<FileRecord>> {
    conn.query_row(
        &format!("{} WHERE path = ?1", SELECT_COLUMNS),
        params![path],
        row_to_record,
    )
    .optional()
    .map_err(StoreError::from)
}

fn write_record(conn: &Connection, record: &FileRecord) -> Result<()> {
    let size = i64::try_from(record.size).map_err(|_| {
        StoreError::InvalidData(format!("size {} of {} exceeds i64", record.size, record.path))
    })?;

    conn.execute(
        "INSERT INTO files (path, size, modified_ms, hash, uploaded, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(path) DO UPDATE SET
            size = excluded.size,
            modified_ms = excluded.modified_ms,
            hash = excluded.hash,
            uploaded = excluded.uploaded,
            updated_at = excluded.updated_at",
        params![
            &record.path,
            size,
            record.modified_ms,
            record.hash.as_bytes().as_slice(),
            record.uploaded,
            now_millis(),
        ],
    )?;
    Ok(())
}

#[async_trait]
impl Inventory for SqliteInventory {
    async fn get(&self, path: &str) -> Result<Option<FileRecord>> {
        let path = path.to_string();
        self.with_conn(move |conn| query_record(conn, &path)).await
    }

    async fn upsert(&self, record: &FileRecord) -> Result<()> {
        let record = record.clone();
        self.with_conn(move |conn| write_record(conn, &record)).await
    }

    async fn compare_and_upsert(
        &self,
        expected: Option<&FileRecord>,
        record: &FileRecord,
    ) -> Result<UpsertResult> {
        let expected = expected.cloned();
        let record = record.clone();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let current = query_record(&tx, &record.path)?;
            if current != expected {
                return Ok(UpsertResult::Conflict { current });
            }

            write_record(&tx, &record)?;
            tx.commit()?;
            Ok(UpsertResult::Written)
        })
        .await
    }

    async fn list(&self) -> Result<Vec<FileRecord>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} ORDER BY path", SELECT_COLUMNS))?;
            let records = stmt
                .query_map([], row_to_record)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(records)
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
