//! blocktree - a disk-resident B+ tree index engine over an LRU buffer pool.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                           blocktree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Index Manager (index/manager)              │    │
//! │  │     one file per index, catalog state in IndexInfo      │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              B+ Tree (index/btree)                      │    │
//! │  │   search / insert / delete / scan, split and merge      │    │
//! │  │   NodeLayout codec + KeyComparator (index/key)          │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Buffer Pool (buffer/)                      │    │
//! │  │   frames + LRU replacer + RAII guards + statistics      │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │              Storage Layer (storage/)                   │    │
//! │  │        DiskManager per file + Page + PageType           │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, BlockId, FrameId, Error, config)
//! - [`buffer`] - Buffer pool and LRU eviction
//! - [`storage`] - Disk I/O and page formats
//! - [`index`] - Keys, the B+ tree, and the index manager
//!
//! # Quick Start
//! ```no_run
//! use blocktree::buffer::BufferPool;
//! use blocktree::index::{int_key, BPlusTree, KeyKind, RecordLocator};
//!
//! let pool = BufferPool::new(64);
//! let file = pool.create_file("people_id.index")?;
//! let mut tree = BPlusTree::create(&pool, file, KeyKind::Int)?;
//!
//! tree.insert(&int_key(1), RecordLocator::new(0, 0))?;
//! pool.flush_all_pages()?;
//! # Ok::<(), blocktree::Error>(())
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{BlockId, Error, FileId, FrameId, PageId, Result};

pub use buffer::{BufferPool, BufferPoolStats, Frame, StatsSnapshot};
pub use index::{BPlusTree, IndexInfo, IndexManager, KeyKind, RecordLocator};
pub use storage::page::{Page, PageType};
pub use storage::DiskManager;
