//! Tree walker: depth-first enumeration of the files under a backup root.
//!
//! Built on `walkdir`, which keeps its own stack of open directories, so deep
//! trees do not grow the call stack. A directory's whole subtree is yielded
//! before its next sibling. Entries are produced lazily, one per `next()`.
//!
//! Only regular files are yielded. Symlinks (unless followed), sockets,
//! FIFOs, devices, unreadable directories and entries that vanish mid-walk
//! are skipped with a warning and counted. A regular file whose name cannot
//! be turned into an object key (not UTF-8) is yielded as an
//! [`UnsupportedEntry`] so the caller can fail it.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use coldsync_core::FileStat;
use coldsync_sink::ObjectKey;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::error::{EngineError, Result};

/// Tree walker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    /// Visit directory entries in file-name order (otherwise listing order).
    pub sort_entries: bool,
    /// Follow symbolic links instead of skipping them.
    pub follow_symlinks: bool,
    /// File or directory names to leave out entirely (e.g. ".git").
    pub ignore_names: Vec<String>,
    /// Absolute paths to leave out, with everything below them.
    pub exclude_paths: Vec<PathBuf>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            sort_entries: true,
            follow_symlinks: false,
            ignore_names: Vec::new(),
            exclude_paths: Vec::new(),
        }
    }
}

/// A regular file found under the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute path.
    pub path: PathBuf,
    /// Root-relative object key.
    pub key: ObjectKey,
    /// Size and mtime as seen by the walk.
    pub stat: FileStat,
}

impl FileEntry {
    /// Inventory key for this file: its absolute path.
    pub fn inventory_key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// A regular file the walk found but cannot name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {reason}", path.display())]
pub struct UnsupportedEntry {
    /// Absolute path.
    pub path: PathBuf,
    pub reason: String,
}

type EntryIter = Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>;

/// Filesystem walker
pub struct Walker {
    root: PathBuf,
    entries: EntryIter,
    skipped: u64,
}

impl Walker {
    /// Start a walk at `root`, which must be an existing directory.
    pub fn new(root: impl Into<PathBuf>, config: WalkerConfig) -> Result<Self> {
        let root = root.into();

        let metadata = std::fs::metadata(&root).map_err(|e| EngineError::Root {
            path: root.clone(),
            reason: e.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(EngineError::Root {
                path: root,
                reason: "not a directory".into(),
            });
        }

        let mut walk = WalkDir::new(&root)
            .min_depth(1)
            .follow_links(config.follow_symlinks);
        if config.sort_entries {
            walk = walk.sort_by_file_name();
        }

        let WalkerConfig {
            ignore_names,
            exclude_paths,
            ..
        } = config;
        let entries = walk
            .into_iter()
            .filter_entry(move |entry| !is_excluded(entry, &ignore_names, &exclude_paths));

        Ok(Self {
            root,
            entries: Box::new(entries),
            skipped: 0,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Entries skipped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    fn skip(&mut self, path: &Path, reason: &str) {
        self.skipped += 1;
        tracing::warn!(path = %path.display(), reason, "skipping entry");
    }

    fn file_entry(&mut self, entry: &DirEntry) -> Option<WalkItem> {
        let stat = match stat_of(entry) {
            Ok(stat) => stat,
            Err(reason) => {
                self.skip(entry.path(), &reason);
                return None;
            }
        };

        let key = entry
            .path()
            .strip_prefix(&self.root)
            .map_err(|_| "outside the backup root".to_string())
            .and_then(|relative| ObjectKey::from_relative(relative).map_err(|e| e.to_string()));

        Some(match key {
            Ok(key) => Ok(FileEntry {
                path: entry.path().to_path_buf(),
                key,
                stat,
            }),
            Err(reason) => Err(UnsupportedEntry {
                path: entry.path().to_path_buf(),
                reason,
            }),
        })
    }
}

/// One item of a walk.
pub type WalkItem = std::result::Result<FileEntry, UnsupportedEntry>;

impl Iterator for Walker {
    type Item = WalkItem;

    fn next(&mut self) -> Option<WalkItem> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    self.skip(&path, &e.to_string());
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_dir() {
                continue;
            }
            if !file_type.is_file() {
                let kind = if file_type.is_symlink() {
                    "symbolic link"
                } else {
                    "special file"
                };
                self.skip(entry.path(), kind);
                continue;
            }

            if let Some(item) = self.file_entry(&entry) {
                return Some(item);
            }
        }
    }
}

fn stat_of(entry: &DirEntry) -> std::result::Result<FileStat, String> {
    let metadata = entry.metadata().map_err(|e| e.to_string())?;
    let modified = metadata.modified().map_err(|e| e.to_string())?;
    Ok(FileStat {
        size: metadata.len(),
        modified_ms: unix_millis(modified),
    })
}

fn is_excluded(entry: &DirEntry, ignore_names: &[String], exclude_paths: &[PathBuf]) -> bool {
    let name = entry.file_name().to_string_lossy();
    ignore_names.iter().any(|n| *n == name)
        || exclude_paths.iter().any(|p| entry.path().starts_with(p))
}

/// Milliseconds since the Unix epoch; negative before it.
pub fn unix_millis(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}
