//! The Reconciler: walks a tree and brings cold storage up to date.
//!
//! Files are reconciled strictly one at a time in walk order. For each file
//! the digest is computed, the inventory consulted, and only when something
//! changed is the file uploaded. The inventory record is written last, after
//! the sink confirmed the upload, so `uploaded = true` always means "these
//! bytes are in cold storage".

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use coldsync_core::{needs_upload, ChangeReason, Digest, FileRecord};
use coldsync_sink::{PutReceipt, PutRequest, StorageClass, StorageSink};
use coldsync_store::{Inventory, UpsertResult};
use serde::{Deserialize, Serialize};

use crate::digest::digest_file;
use crate::error::{EngineError, FileError, Result};
use crate::walker::{FileEntry, Walker, WalkerConfig};

/// What to do when a single file cannot be backed up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Abort the run at the first failed file.
    #[default]
    Halt,
    /// Record the failure and move on to the next file.
    Continue,
}

/// Configuration for a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct ReconcilerConfig {
    /// Storage class requested for every upload.
    pub storage_class: StorageClass,
    pub failure_policy: FailurePolicy,
    /// Upper bound on a single upload. `None` waits indefinitely.
    pub upload_timeout: Option<Duration>,
    /// Report inventory records whose file was not seen by the walk.
    pub detect_stale: bool,
    pub walker: WalkerConfig,
}

/// Outcome of reconciling one file.
#[derive(Debug)]
pub enum FileOutcome {
    /// Nothing changed; no upload and no inventory write.
    Unchanged,
    /// Uploaded and recorded.
    Uploaded {
        digest: Digest,
        size: u64,
        reason: ChangeReason,
    },
    /// Could not be backed up. The inventory was left untouched.
    Failed(FileError),
}

/// A file that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedFile {
    /// Inventory key (absolute path).
    pub path: String,
    /// Object key.
    pub key: String,
    pub error: String,
}

/// Summary of a run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    /// Regular files handed to the reconciler.
    pub files_seen: u64,
    pub unchanged: u64,
    pub uploaded: u64,
    pub bytes_uploaded: u64,
    /// Walk entries skipped (symlinks, special files, unreadable entries).
    pub skipped: u64,
    pub failed: Vec<FailedFile>,
    /// Recorded paths not present in the tree (only with stale detection).
    pub stale: Vec<String>,
    pub elapsed: Duration,
}

impl RunReport {
    /// True when no file failed.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// The Reconciler.
///
/// Inventory and sink are injected so tests can substitute fakes.
pub struct Reconciler<I: Inventory, S: StorageSink> {
    inventory: Arc<I>,
    sink: Arc<S>,
    root: PathBuf,
    config: ReconcilerConfig,
}

impl<I: Inventory, S: StorageSink> Reconciler<I, S> {
    /// Create a reconciler for the tree at `root`.
    pub fn new(
        inventory: Arc<I>,
        sink: Arc<S>,
        root: impl Into<PathBuf>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            inventory,
            sink,
            root: root.into(),
            config,
        }
    }

    pub fn inventory(&self) -> &Arc<I> {
        &self.inventory
    }

    pub fn sink(&self) -> &Arc<S> {
        &self.sink
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Runs
    // ─────────────────────────────────────────────────────────────────────────

    /// Reconcile the whole tree.
    ///
    /// Under [`FailurePolicy::Halt`] the first failed file ends the run with
    /// [`EngineError::Aborted`]; later files are not stat'ed, hashed, or
    /// looked up. Inventory failures and conflicts always end the run.
    pub async fn run(&self) -> Result<RunReport> {
        let started = Instant::now();
        let root = tokio::fs::canonicalize(&self.root)
            .await
            .map_err(|e| EngineError::Root {
                path: self.root.clone(),
                reason: e.to_string(),
            })?;

        tracing::info!(
            root = %root.display(),
            class = %self.config.storage_class,
            policy = ?self.config.failure_policy,
            "backup started"
        );

        let mut walker = Walker::new(&root, self.config.walker.clone())?;
        let mut report = RunReport::default();
        let mut seen = HashSet::new();

        loop {
            let (returned, next) = tokio::task::spawn_blocking(move || {
                let next = walker.next();
                (walker, next)
            })
            .await
            .map_err(|e| EngineError::Task(e.to_string()))?;
            walker = returned;
            report.skipped = walker.skipped();

            let entry = match next {
                None => break,
                Some(Ok(entry)) => entry,
                Some(Err(unsupported)) => {
                    report.files_seen += 1;
                    let path = unsupported.path.to_string_lossy().into_owned();
                    let key = unsupported
                        .path
                        .strip_prefix(&root)
                        .unwrap_or(&unsupported.path)
                        .to_string_lossy()
                        .into_owned();
                    let error = FileError::from(unsupported);
                    tracing::error!(path = %path, error = %error, "failed");
                    self.record_failure(&mut report, started, path, key, error)?;
                    continue;
                }
            };

            report.files_seen += 1;
            if self.config.detect_stale {
                seen.insert(entry.inventory_key());
            }

            match self.reconcile_file(&entry).await? {
                FileOutcome::Unchanged => report.unchanged += 1,
                FileOutcome::Uploaded { size, .. } => {
                    report.uploaded += 1;
                    report.bytes_uploaded += size;
                }
                FileOutcome::Failed(error) => {
                    self.record_failure(
                        &mut report,
                        started,
                        entry.inventory_key(),
                        entry.key.to_string(),
                        error,
                    )?;
                }
            }
        }

        if self.config.detect_stale {
            report.stale = self.stale_records(&seen).await?;
        }

        report.elapsed = started.elapsed();
        tracing::info!(
            files = report.files_seen,
            uploaded = report.uploaded,
            unchanged = report.unchanged,
            bytes = report.bytes_uploaded,
            skipped = report.skipped,
            failed = report.failed.len(),
            stale = report.stale.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "backup finished"
        );

        Ok(report)
    }

    /// Reconcile a single file.
    ///
    /// Per-file problems come back as [`FileOutcome::Failed`]; only
    /// inventory errors and conflicts are returned as `Err`.
    pub async fn reconcile_file(&self, entry: &FileEntry) -> Result<FileOutcome> {
        let path = entry.inventory_key();

        let digest = match digest_file(&entry.path).await {
            Ok(digest) => digest,
            Err(source) => {
                let error = FileError::Io {
                    path: entry.path.clone(),
                    source,
                };
                tracing::error!(key = %entry.key, error = %error, "failed");
                return Ok(FileOutcome::Failed(error));
            }
        };

        let existing = self.inventory.get(&path).await?;
        let reason = needs_upload(existing.as_ref(), &entry.stat, &digest);
        if !reason.needs_upload() {
            tracing::info!(key = %entry.key, "unchanged");
            return Ok(FileOutcome::Unchanged);
        }

        let receipt = match self.upload(entry, digest).await {
            Ok(receipt) => receipt,
            Err(error) => {
                tracing::error!(key = %entry.key, %reason, error = %error, "failed");
                return Ok(FileOutcome::Failed(error));
            }
        };

        let record = FileRecord::uploaded(path.clone(), entry.stat, digest);
        match self
            .inventory
            .compare_and_upsert(existing.as_ref(), &record)
            .await?
        {
            UpsertResult::Written => {}
            UpsertResult::Conflict { .. } => {
                return Err(EngineError::InventoryConflict { path });
            }
        }

        tracing::info!(
            key = %entry.key,
            %reason,
            size = receipt.size,
            digest = %digest,
            "uploaded"
        );

        Ok(FileOutcome::Uploaded {
            digest,
            size: receipt.size,
            reason,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Add a failed file to the report; under the halt policy, end the run.
    fn record_failure(
        &self,
        report: &mut RunReport,
        started: Instant,
        path: String,
        key: String,
        error: FileError,
    ) -> Result<()> {
        report.failed.push(FailedFile {
            path: path.clone(),
            key,
            error: error.to_string(),
        });
        if self.config.failure_policy == FailurePolicy::Continue {
            return Ok(());
        }

        report.elapsed = started.elapsed();
        tracing::error!(
            path = %path,
            uploaded = report.uploaded,
            unchanged = report.unchanged,
            "backup aborted"
        );
        Err(EngineError::Aborted {
            path,
            source: error,
            report: Box::new(std::mem::take(report)),
        })
    }

    async fn upload(
        &self,
        entry: &FileEntry,
        digest: Digest,
    ) -> std::result::Result<PutReceipt, FileError> {
        let file = tokio::fs::File::open(&entry.path)
            .await
            .map_err(|source| FileError::Io {
                path: entry.path.clone(),
                source,
            })?;

        let request = PutRequest::new(entry.key.clone(), file, digest)
            .with_storage_class(self.config.storage_class);
        let put = self.sink.put(request);

        match self.config.upload_timeout {
            Some(limit) => match tokio::time::timeout(limit, put).await {
                Ok(result) => Ok(result?),
                Err(_) => Err(FileError::Timeout(limit)),
            },
            None => Ok(put.await?),
        }
    }

    async fn stale_records(&self, seen: &HashSet<String>) -> Result<Vec<String>> {
        let stale: Vec<String> = self
            .inventory
            .list()
            .await?
            .into_iter()
            .map(|record| record.path)
            .filter(|path| !seen.contains(path))
            .collect();

        for path in &stale {
            tracing::warn!(path = %path, "recorded file no longer present");
        }
        Ok(stale)
    }
}
