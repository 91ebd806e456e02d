//! # coldsync Testkit
//!
//! Testing utilities for coldsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: scratch directory trees with mtime control
//! - **Counting inventory**: an inventory wrapper that records which paths were looked up
//!   and written
//! - **Generators**: Proptest strategies for random trees
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use coldsync_testkit::{TreeFixture, TreeSpec};
//!
//! proptest! {
//!     #[test]
//!     fn second_run_uploads_nothing(spec: TreeSpec) {
//!         let tree = TreeFixture::new();
//!         spec.materialize(&tree);
//!         // run twice, count sink calls
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use coldsync_testkit::TreeFixture;
//!
//! let tree = TreeFixture::new();
//! tree.write("a.txt", "hi");
//! tree.write("sub/b.txt", "bye");
//! assert!(tree.path("sub/b.txt").exists());
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{CountingInventory, TreeFixture};
pub use generators::TreeSpec;
