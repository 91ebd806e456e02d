//! Request, receipt and metadata types for sink operations.

use std::collections::BTreeMap;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;

use coldsync_core::Digest;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::SinkError;
use crate::key::ObjectKey;

/// Metadata key carrying the content digest on every stored object.
pub const CONTENT_HASH_METADATA: &str = "content-hash";

/// An owned stream of object bytes.
pub type ByteStream = Pin<Box<dyn AsyncRead + Send>>;

/// Storage tier for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StorageClass {
    Standard,
    InfrequentAccess,
    /// Cold tier: cheap to keep, slow to retrieve.
    #[default]
    Glacier,
    DeepArchive,
}

impl StorageClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageClass::Standard => "STANDARD",
            StorageClass::InfrequentAccess => "INFREQUENT_ACCESS",
            StorageClass::Glacier => "GLACIER",
            StorageClass::DeepArchive => "DEEP_ARCHIVE",
        }
    }

    /// Whether this class is a cold tier.
    pub fn is_cold(self) -> bool {
        matches!(self, StorageClass::Glacier | StorageClass::DeepArchive)
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageClass {
    type Err = SinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "STANDARD" => Ok(StorageClass::Standard),
            "INFREQUENT_ACCESS" | "STANDARD_IA" => Ok(StorageClass::InfrequentAccess),
            "GLACIER" | "COLD" => Ok(StorageClass::Glacier),
            "DEEP_ARCHIVE" => Ok(StorageClass::DeepArchive),
            _ => Err(SinkError::UnknownStorageClass(s.to_string())),
        }
    }
}

/// User metadata attached to a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMetadata {
    /// Content digest of the object, as recorded in the inventory.
    pub content_hash: Digest,
}

impl ObjectMetadata {
    pub fn for_content(content_hash: Digest) -> Self {
        Self { content_hash }
    }

    /// Flatten into string pairs, the shape object stores expose.
    pub fn to_map(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(
            CONTENT_HASH_METADATA.to_string(),
            self.content_hash.to_hex(),
        )])
    }
}

/// A request to store one object.
pub struct PutRequest {
    /// Root-relative object key.
    pub key: ObjectKey,
    /// The object bytes.
    pub content: ByteStream,
    /// Integrity checksum the sink must verify against the received bytes.
    pub checksum: Digest,
    pub metadata: ObjectMetadata,
    pub storage_class: StorageClass,
}

impl PutRequest {
    /// Create a request whose metadata carries `checksum` as the content hash
    /// and whose storage class is the cold default.
    pub fn new(key: ObjectKey, content: impl AsyncRead + Send + 'static, checksum: Digest) -> Self {
        Self {
            key,
            content: Box::pin(content),
            checksum,
            metadata: ObjectMetadata::for_content(checksum),
            storage_class: StorageClass::default(),
        }
    }

    pub fn with_storage_class(mut self, storage_class: StorageClass) -> Self {
        self.storage_class = storage_class;
        self
    }

    pub fn with_metadata(mut self, metadata: ObjectMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

impl fmt::Debug for PutRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PutRequest")
            .field("key", &self.key)
            .field("checksum", &self.checksum)
            .field("metadata", &self.metadata)
            .field("storage_class", &self.storage_class)
            .finish_non_exhaustive()
    }
}

/// Confirmation that an object is durably stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutReceipt {
    pub key: ObjectKey,
    /// Bytes received and stored.
    pub size: u64,
    /// Verified checksum of the stored bytes.
    pub checksum: Digest,
    pub storage_class: StorageClass,
}

/// Description of a stored object, as kept next to it by [`crate::FsSink`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: ObjectKey,
    pub size: u64,
    pub checksum: Digest,
    pub metadata: BTreeMap<String, String>,
    pub storage_class: StorageClass,
    /// When the object was stored (Unix ms).
    pub stored_at: i64,
}

impl StoredObject {
    /// The content hash recorded in the object metadata, if present and valid.
    pub fn content_hash(&self) -> Option<Digest> {
        self.metadata
            .get(CONTENT_HASH_METADATA)
            .and_then(|hex| Digest::from_hex(hex).ok())
    }
}
