//! Common types and utilities shared across blocktree.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants
//! - Error types
//! - Identifiers (PageId, FileId, BlockId, FrameId)

pub mod config;
pub mod error;
mod block_id;
mod frame_id;
mod page_id;

pub use block_id::{BlockId, FileId};
pub use error::{Error, Result};
pub use frame_id::FrameId;
pub use page_id::PageId;
