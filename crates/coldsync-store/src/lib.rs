//! # coldsync store
//!
//! The inventory: a durable keyed record store mapping a file path to its
//! last-known size, modification time, digest and upload status.
//!
//! ## Overview
//!
//! The reconciler only talks to the [`Inventory`] trait, so the backing store
//! can be swapped. [`SqliteInventory`] is the persistent implementation,
//! [`MemoryInventory`] keeps everything in process for tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use coldsync_core::{Digest, FileRecord, FileStat};
//! use coldsync_store::{Inventory, SqliteInventory};
//!
//! async fn example() {
//!     let inventory = SqliteInventory::open("inventory.db").unwrap();
//!
//!     let stat = FileStat { size: 2, modified_ms: 1_700_000_000_000 };
//!     let record = FileRecord::uploaded("/data/a.txt", stat, Digest::of(b"hi"));
//!     inventory.upsert(&record).await.unwrap();
//!
//!     let found = inventory.get("/data/a.txt").await.unwrap();
//!     assert_eq!(found, Some(record));
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **One record per path**: `path` is the primary key; writes are upserts.
//! - **Conditional writes**: [`Inventory::compare_and_upsert`] only writes when
//!   the stored record still equals what the caller read.
//! - **No deletes**: records outlive the files they describe.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryInventory;
pub use sqlite::SqliteInventory;
pub use traits::{Inventory, UpsertResult};
