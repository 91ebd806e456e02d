//! File records and the change-detection predicate.
//!
//! A [`FileRecord`] is the inventory's memory of one path as of the last
//! confirmed upload. Size and modification time are cheap triggers; only a
//! digest match proves the content is unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Digest;

/// Live filesystem stats for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStat {
    /// Byte length.
    pub size: u64,
    /// Modification time (Unix ms).
    pub modified_ms: i64,
}

/// The inventory's last-known state of a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Unique inventory key.
    pub path: String,
    /// Byte length at last successful reconciliation.
    pub size: u64,
    /// Modification time at last successful reconciliation (Unix ms).
    pub modified_ms: i64,
    /// Content digest at last successful reconciliation.
    pub hash: Digest,
    /// True only once the sink has confirmed durable storage of `hash`.
    pub uploaded: bool,
}

impl FileRecord {
    /// Build the record written after the sink confirmed an upload.
    pub fn uploaded(path: impl Into<String>, stat: FileStat, hash: Digest) -> Self {
        Self {
            path: path.into(),
            size: stat.size,
            modified_ms: stat.modified_ms,
            hash,
            uploaded: true,
        }
    }

    /// The stats captured in this record.
    pub fn stat(&self) -> FileStat {
        FileStat {
            size: self.size,
            modified_ms: self.modified_ms,
        }
    }
}

/// Outcome of comparing live state against the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeReason {
    /// Recorded state matches: no upload, no inventory write.
    Unchanged,
    /// No record exists for this path.
    New,
    /// A record exists but never confirmed an upload.
    NotUploaded,
    /// Byte length differs.
    SizeChanged,
    /// Recorded modification time is older than the live one.
    Modified,
    /// Content digest differs.
    ContentChanged,
}

impl ChangeReason {
    /// Whether this outcome requires an upload.
    pub fn needs_upload(self) -> bool {
        !matches!(self, ChangeReason::Unchanged)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeReason::Unchanged => "unchanged",
            ChangeReason::New => "new",
            ChangeReason::NotUploaded => "not-uploaded",
            ChangeReason::SizeChanged => "size-changed",
            ChangeReason::Modified => "modified",
            ChangeReason::ContentChanged => "content-changed",
        }
    }
}

impl fmt::Display for ChangeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether a file needs uploading.
///
/// The triggers are OR'd: size differs, recorded mtime strictly older than
/// live, or digest differs. A live mtime equal to or older than the recorded
/// one is not proof of equality; the digest still decides.
pub fn needs_upload(existing: Option<&FileRecord>, stat: &FileStat, digest: &Digest) -> ChangeReason {
    let Some(record) = existing else {
        return ChangeReason::New;
    };

    if !record.uploaded {
        ChangeReason::NotUploaded
    } else if record.size != stat.size {
        ChangeReason::SizeChanged
    } else if record.modified_ms < stat.modified_ms {
        ChangeReason::Modified
    } else if record.hash != *digest {
        ChangeReason::ContentChanged
    } else {
        ChangeReason::Unchanged
    }
}
