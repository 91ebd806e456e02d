//! Directory-backed cold storage.
//!
//! Layout under the destination root:
//!
//! ```text
//! objects/<aa>/<name>       object bytes
//! meta/<aa>/<name>.json     StoredObject sidecar (key, checksum, metadata, class)
//! tmp/                      staging area, emptied when the sink is opened
//! ```
//!
//! `<name>` is the BLAKE3 hex of the object key and `<aa>` its first two
//! characters, so every key maps to its own file whatever characters it
//! contains and whatever other keys exist (`a` and `a/b` can both be stored).
//! The sidecar carries the key itself.
//!
//! Bytes are streamed into `tmp/`, verified, synced, and renamed into place.
//! The sidecar is committed last, so [`FsSink::head`] only describes objects
//! whose bytes are in place.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use coldsync_core::Digest;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::key::ObjectKey;
use crate::sink::{copy_verified, StorageSink};
use crate::types::{PutReceipt, PutRequest, StoredObject};

const OBJECTS_DIR: &str = "objects";
const META_DIR: &str = "meta";
const STAGING_DIR: &str = "tmp";

static NEXT_STAGING_ID: AtomicU64 = AtomicU64::new(0);

/// Filesystem storage sink.
#[derive(Debug, Clone)]
pub struct FsSink {
    root: PathBuf,
}

impl FsSink {
    /// Use `root` as the destination, creating it if needed.
    ///
    /// Staging files left behind by an interrupted run are removed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(root.join(OBJECTS_DIR))?;
        std::fs::create_dir_all(root.join(META_DIR))?;

        let staging = root.join(STAGING_DIR);
        std::fs::create_dir_all(&staging)?;
        let mut swept = 0u64;
        for entry in std::fs::read_dir(&staging)? {
            let path = entry?.path();
            if path.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            swept += 1;
        }
        if swept > 0 {
            tracing::debug!(root = %root.display(), swept, "removed leftover staging files");
        }

        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the bytes of `key` live.
    pub fn object_path(&self, key: &ObjectKey) -> PathBuf {
        let (shard, name) = address(key);
        self.root.join(OBJECTS_DIR).join(shard).join(name)
    }

    fn meta_path(&self, key: &ObjectKey) -> PathBuf {
        let (shard, name) = address(key);
        self.root
            .join(META_DIR)
            .join(shard)
            .join(format!("{name}.json"))
    }

    fn staging_dir(&self) -> PathBuf {
        self.root.join(STAGING_DIR)
    }

    fn stage(&self) -> Staged {
        let id = NEXT_STAGING_ID.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}-{}.partial", std::process::id(), id);
        Staged::new(self.staging_dir().join(name))
    }

    /// Read the sidecar of a stored object.
    pub async fn head(&self, key: &ObjectKey) -> Result<Option<StoredObject>> {
        match fs::read(self.meta_path(key)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl StorageSink for FsSink {
    async fn put(&self, mut request: PutRequest) -> Result<PutReceipt> {
        let object = self.object_path(&request.key);
        let meta = self.meta_path(&request.key);

        let staged_object = self.stage();
        let mut file = fs::File::create(staged_object.path()).await?;
        let size = copy_verified(
            request.key.as_str(),
            &mut request.content,
            &mut file,
            &request.checksum,
        )
        .await?;
        file.sync_all().await?;
        drop(file);

        let sidecar = StoredObject {
            key: request.key.clone(),
            size,
            checksum: request.checksum,
            metadata: request.metadata.to_map(),
            storage_class: request.storage_class,
            stored_at: now_millis(),
        };
        let staged_meta = self.stage();
        write_synced(staged_meta.path(), &serde_json::to_vec_pretty(&sidecar)?).await?;

        create_parent(&object).await?;
        create_parent(&meta).await?;

        // The previous sidecar must not outlive the bytes it describes.
        remove_if_present(&meta).await?;
        staged_object.persist(&object).await?;
        staged_meta.persist(&meta).await?;

        tracing::debug!(
            key = %request.key,
            size,
            class = %request.storage_class,
            "object stored"
        );
        Ok(PutReceipt {
            key: request.key,
            size,
            checksum: request.checksum,
            storage_class: request.storage_class,
        })
    }
}

/// A file in the staging area, removed on drop unless persisted.
///
/// Dropping a `put` future mid-write (a timeout) still cleans up.
struct Staged {
    path: PathBuf,
    persisted: bool,
}

impl Staged {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            persisted: false,
        }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(mut self, to: &Path) -> Result<()> {
        fs::rename(&self.path, to).await?;
        self.persisted = true;
        Ok(())
    }
}

impl Drop for Staged {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "could not remove staging file");
            }
        }
    }
}

/// Shard directory and file name for a key.
fn address(key: &ObjectKey) -> (String, String) {
    let name = Digest::of(key.as_str().as_bytes()).to_hex();
    (name[..2].to_string(), name)
}

async fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    Ok(())
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

/// Get current time in milliseconds.
fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
