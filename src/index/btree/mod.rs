//! Disk-resident B+ tree.
//!
//! # Components
//! - [`NodeLayout`] - Byte layout and capacity of node blocks
//! - [`Node`], [`LeafNode`], [`InternalNode`] - Typed views over guarded
//!   blocks
//! - [`BPlusTree`] - Search, insert, delete, validation
//! - [`Scan`] - Ordered iteration along the leaf chain

mod layout;
mod node;
mod scan;
mod tree;

pub use layout::{NodeLayout, NODE_HEADER_SIZE};
pub use node::{InternalNode, LeafNode, Node};
pub use scan::Scan;
pub use tree::{BPlusTree, TreeStats};
