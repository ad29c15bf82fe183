//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between the index and its
//! files. It manages a fixed pool of frames, each holding one block.
//!
//! # Components
//! - [`BufferPool`] - The block cache and file registry
//! - [`Frame`] - A slot in the buffer pool holding a page + metadata
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for block access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy

mod buffer_pool;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use frame::Frame;
pub use page_guard::{PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
