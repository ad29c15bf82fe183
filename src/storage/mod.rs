//! Storage layer - disk I/O and page formats.
//!
//! This module handles persistent storage:
//! - [`DiskManager`] - Low-level file I/O, one per index file
//! - [`page`] - Raw pages and their type tag

mod disk_manager;
pub mod page;

pub use disk_manager::DiskManager;
