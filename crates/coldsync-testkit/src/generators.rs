//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use crate::fixtures::TreeFixture;

/// Generate a directory name. Never ends in `.txt`, so it cannot collide
/// with a generated file name.
pub fn dir_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}".prop_map(String::from)
}

/// Generate a file name.
pub fn file_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,11}".prop_map(|stem| format!("{stem}.txt"))
}

/// Generate a root-relative file path, up to three directories deep.
pub fn relative_path() -> impl Strategy<Value = String> {
    (prop::collection::vec(dir_name(), 0..=3), file_name()).prop_map(|(dirs, file)| {
        let mut parts = dirs;
        parts.push(file);
        parts.join("/")
    })
}

/// Generate file contents of up to `max_len` bytes.
pub fn contents(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// A directory tree: relative path to file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSpec {
    pub files: BTreeMap<String, Vec<u8>>,
}

impl TreeSpec {
    /// Write every file into `tree`.
    pub fn materialize(&self, tree: &TreeFixture) {
        for (rel, body) in &self.files {
            tree.write(rel, body);
        }
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Total bytes across all files.
    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|b| b.len() as u64).sum()
    }
}

impl Arbitrary for TreeSpec {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop::collection::btree_map(relative_path(), contents(4096), 0..12)
            .prop_map(|files| TreeSpec { files })
            .boxed()
    }
}
