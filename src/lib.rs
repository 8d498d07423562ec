//! Disk-page B+Tree over fixed-width keys and values, with monoid summaries for range aggregates.
//!
//! ```
//! use pagetree::btree::BTree;
//! use pagetree::monoid::Count;
//! use pagetree::storage::MemoryStorage;
//! use pagetree::unboxed::{I64, U64};
//!
//! let mut tree = BTree::create(MemoryStorage::new(4096), U64, I64, Count)?;
//! tree.put(&3, &-30)?;
//! tree.put(&1, &-10)?;
//! assert_eq!(tree.get(&3)?, Some(-30));
//! assert_eq!(tree.aggregate(0..=2)?, 1);
//! # Ok::<(), pagetree::errors::Error>(())
//! ```
#[macro_use]
pub mod errors;
pub mod btree;
pub mod config;
pub mod monoid;
pub mod storage;
pub mod unboxed;

pub use btree::{BTree, TreeStats};
pub use errors::Error;
