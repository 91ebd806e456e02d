//! Object keys: root-relative, `/`-separated, never escaping the root.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};

use crate::error::{Result, SinkError};

/// A validated object key such as `sub/b.txt`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Validate a `/`-separated key.
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into();

        if key.is_empty() {
            return Err(SinkError::InvalidKey("empty key".into()));
        }
        if key.starts_with('/') {
            return Err(SinkError::InvalidKey(format!("{}: absolute key", key)));
        }
        for segment in key.split('/') {
            match segment {
                "" => return Err(SinkError::InvalidKey(format!("{}: empty segment", key))),
                "." | ".." => {
                    return Err(SinkError::InvalidKey(format!(
                        "{}: relative segment {:?}",
                        key, segment
                    )))
                }
                s if s.contains('\0') => {
                    return Err(SinkError::InvalidKey(format!(
                        "{}: NUL in {:?}",
                        key, s
                    )))
                }
                _ => {}
            }
        }

        Ok(Self(key))
    }

    /// Build a key from a path relative to the backup root.
    ///
    /// Fails for absolute paths, `..` components, and non-UTF-8 names.
    pub fn from_relative(path: &Path) -> Result<Self> {
        let mut segments = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(name) => {
                    let name = name.to_str().ok_or_else(|| {
                        SinkError::InvalidKey(format!("{}: not valid UTF-8", path.display()))
                    })?;
                    segments.push(name);
                }
                Component::CurDir => {}
                _ => {
                    return Err(SinkError::InvalidKey(format!(
                        "{}: not a relative path below the root",
                        path.display()
                    )))
                }
            }
        }
        Self::new(segments.join("/"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({})", self.0)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = SinkError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_from_relative_path() {
        let key = ObjectKey::from_relative(Path::new("sub/b.txt")).unwrap();
        assert_eq!(key.as_str(), "sub/b.txt");

        let key = ObjectKey::from_relative(Path::new("./a.txt")).unwrap();
        assert_eq!(key.as_str(), "a.txt");
    }

    #[test]
    fn test_key_rejects_escapes() {
        assert!(ObjectKey::new("").is_err());
        assert!(ObjectKey::new("/etc/passwd").is_err());
        assert!(ObjectKey::new("a/../../b").is_err());
        assert!(ObjectKey::new("a//b").is_err());
        assert!(ObjectKey::from_relative(Path::new("../x")).is_err());
        assert!(ObjectKey::from_relative(Path::new("/abs/x")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_key_allows_backslash_in_names() {
        let key = ObjectKey::from_relative(Path::new("dir/a\\b.txt")).unwrap();
        assert_eq!(key.as_str(), "dir/a\\b.txt");
        assert!(ObjectKey::new("a\0b").is_err());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_key_rejects_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let path = Path::new(OsStr::from_bytes(b"bad\xff.txt"));
        assert!(ObjectKey::from_relative(path).is_err());
    }

    #[test]
    fn test_key_deserialize_validates() {
        let ok: ObjectKey = serde_json::from_str("\"a/b\"").unwrap();
        assert_eq!(ok.as_str(), "a/b");
        assert!(serde_json::from_str::<ObjectKey>("\"../b\"").is_err());
    }
}
