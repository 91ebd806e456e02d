//! Strong type definitions for coldsync.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Length of a [`Digest`] in bytes.
pub const DIGEST_LEN: usize = 32;

/// A 32-byte BLAKE3 digest of a file's full content.
///
/// The same value serves as the change-detection fingerprint stored in the
/// inventory, the integrity checksum handed to the storage sink, and the
/// `content-hash` metadata attached to the stored object.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(pub [u8; DIGEST_LEN]);

impl Digest {
    /// Digest an in-memory buffer.
    pub fn of(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self, CoreError> {
        let bytes = hex::decode(s)?;
        Self::try_from(bytes.as_slice())
    }

    /// The zero digest (sentinel).
    pub const ZERO: Self = Self([0u8; DIGEST_LEN]);
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl TryFrom<&[u8]> for Digest {
    type Error = CoreError;

    fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
        let arr: [u8; DIGEST_LEN] =
            slice
                .try_into()
                .map_err(|_| CoreError::InvalidDigestLength {
                    expected: DIGEST_LEN,
                    got: slice.len(),
                })?;
        Ok(Self(arr))
    }
}

impl FromStr for Digest {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Digests travel as hex strings in JSON sidecars and config.
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_digest_of_matches_blake3() {
        let digest = Digest::of(b"hi");
        assert_eq!(digest.as_bytes(), blake3::hash(b"hi").as_bytes());
        assert_ne!(digest, Digest::of(b"bye"));
    }

    #[test]
    fn test_digest_display_is_full_hex() {
        let digest = Digest::from_bytes([0xab; 32]);
        assert_eq!(format!("{}", digest), "ab".repeat(32));
        assert_eq!(format!("{:?}", digest), "Digest(abababababababab)");
    }

    #[test]
    fn test_digest_rejects_wrong_length() {
        let err = Digest::from_hex("abcd").unwrap_err();
        assert!(matches!(
            err,
            CoreError::InvalidDigestLength { expected: 32, got: 2 }
        ));
        assert!(matches!(
            Digest::from_hex("zz").unwrap_err(),
            CoreError::InvalidHex(_)
        ));
    }

    #[test]
    fn test_digest_serializes_as_hex_string() {
        let digest = Digest::of(b"payload");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, format!("\"{}\"", digest.to_hex()));

        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    proptest! {
        #[test]
        fn digest_hex_parses_back(bytes in any::<[u8; 32]>()) {
            let digest = Digest::from_bytes(bytes);
            prop_assert_eq!(digest.to_hex().parse::<Digest>().unwrap(), digest);
        }
    }
}
