//! Eviction policy implementations (replacers).
//!
//! Currently implements:
//! - [`LruReplacer`] - age-counter LRU: every access zeroes the touched
//!   frame's age and ages every other frame by one

mod lru;

pub use lru::LruReplacer;
