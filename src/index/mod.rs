//! Index layer.
//!
//! # Components
//! - [`key`] - Key kinds, the comparator every tree ordering goes through,
//!   and record locators
//! - [`btree`] - The disk-resident B+ tree
//! - [`IndexManager`] - Name-level facade: one file and one tree per index

pub mod btree;
pub mod key;
mod manager;

pub use btree::{BPlusTree, Scan, TreeStats};
pub use key::{float_key, int_key, KeyComparator, KeyKind, RecordLocator};
pub use manager::{IndexInfo, IndexManager, StoredRow};
