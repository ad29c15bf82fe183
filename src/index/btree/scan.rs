//! Ordered scans along the leaf chain.

use std::cmp::Ordering;
use std::collections::VecDeque;
use std::ops::Bound;

use crate::buffer::BufferPool;
use crate::common::{BlockId, FileId, PageId, Result};
use crate::index::key::{KeyComparator, RecordLocator};

use super::layout::NodeLayout;
use super::node::LeafNode;

/// Iterator over `(key, locator)` entries in key order.
///
/// Created by [`BPlusTree::iter`](super::BPlusTree::iter) and
/// [`BPlusTree::range`](super::BPlusTree::range). Each leaf is copied out
/// when the scan reaches it, so no block stays pinned between calls to
/// `next`. Modifying the tree while a scan is open gives unspecified (but
/// memory-safe) results.
pub struct Scan<'a> {
    pool: &'a BufferPool,
    file: FileId,
    layout: NodeLayout,
    cmp: KeyComparator,
    /// Next leaf to load, `INVALID` once the chain is exhausted.
    next_leaf: PageId,
    buffered: VecDeque<(Vec<u8>, RecordLocator)>,
    lower: Bound<Vec<u8>>,
    upper: Bound<Vec<u8>>,
    done: bool,
}

impl<'a> Scan<'a> {
    pub(super) fn new(
        pool: &'a BufferPool,
        file: FileId,
        layout: NodeLayout,
        cmp: KeyComparator,
        start: PageId,
        lower: Bound<Vec<u8>>,
        upper: Bound<Vec<u8>>,
    ) -> Self {
        Self {
            pool,
            file,
            layout,
            cmp,
            next_leaf: start,
            buffered: VecDeque::new(),
            lower,
            upper,
            done: false,
        }
    }

    /// Load the next leaf of the chain into the buffer.
    fn load_next_leaf(&mut self) -> Result<()> {
        let block = BlockId::new(self.file, self.next_leaf);
        let guard = self.pool.fetch_page_read(block)?;
        let leaf = LeafNode::from_guard(block, guard, self.layout)?;

        self.next_leaf = leaf.next();
        self.buffered = leaf
            .entries()
            .into_iter()
            .filter(|(key, _)| self.above_lower(key))
            .collect();
        Ok(())
    }

    fn above_lower(&self, key: &[u8]) -> bool {
        match &self.lower {
            Bound::Included(lo) => self.cmp.compare(key, lo) != Ordering::Less,
            Bound::Excluded(lo) => self.cmp.compare(key, lo) == Ordering::Greater,
            Bound::Unbounded => true,
        }
    }

    fn below_upper(&self, key: &[u8]) -> bool {
        match &self.upper {
            Bound::Included(hi) => self.cmp.compare(key, hi) != Ordering::Greater,
            Bound::Excluded(hi) => self.cmp.compare(key, hi) == Ordering::Less,
            Bound::Unbounded => true,
        }
    }
}

impl Iterator for Scan<'_> {
    type Item = Result<(Vec<u8>, RecordLocator)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while self.buffered.is_empty() {
            if !self.next_leaf.is_valid() {
                self.done = true;
                return None;
            }
            if let Err(e) = self.load_next_leaf() {
                self.done = true;
                return Some(Err(e));
            }
        }

        let (key, locator) = self.buffered.pop_front()?;
        if !self.below_upper(&key) {
            self.done = true;
            self.buffered.clear();
            return None;
        }
        Some(Ok((key, locator)))
    }
}
