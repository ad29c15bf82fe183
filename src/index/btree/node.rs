//! Typed views over node blocks.
//!
//! [`LeafNode`] and [`InternalNode`] wrap a page guard together with the
//! tree's [`NodeLayout`]. Read accessors only need `Deref<Target = Page>`,
//! so a read guard works for lookups and a write guard stays clean until a
//! mutator is called.

use std::cmp::Ordering;
use std::ops::{Deref, DerefMut};

use crate::common::{BlockId, Error, PageId, Result};
use crate::index::key::{KeyComparator, RecordLocator};
use crate::storage::page::{Page, PageType};

use super::layout::NodeLayout;

/// A node block of either kind.
pub enum Node<G> {
    Internal(InternalNode<G>),
    Leaf(LeafNode<G>),
}

impl<G: Deref<Target = Page>> Node<G> {
    /// Wrap a guard, dispatching on the block's tag.
    ///
    /// # Errors
    /// `Error::CorruptNode` if the block is not tagged as a node or claims
    /// more entries than a node can hold.
    pub fn from_guard(block: BlockId, guard: G, layout: NodeLayout) -> Result<Self> {
        let count = layout.count(guard.as_slice());
        if count > layout.max_entries() {
            return Err(Error::corrupt(
                block,
                format!("count {} exceeds capacity {}", count, layout.max_entries()),
            ));
        }

        match layout.tag(guard.as_slice()) {
            PageType::BTreeLeaf => Ok(Node::Leaf(LeafNode { block, guard, layout })),
            PageType::BTreeInternal => Ok(Node::Internal(InternalNode { block, guard, layout })),
            other => Err(Error::corrupt(block, format!("expected node tag, found {:?}", other))),
        }
    }

    pub fn page_id(&self) -> PageId {
        match self {
            Node::Internal(n) => n.page_id(),
            Node::Leaf(n) => n.page_id(),
        }
    }

    pub fn count(&self) -> usize {
        match self {
            Node::Internal(n) => n.count(),
            Node::Leaf(n) => n.count(),
        }
    }

    pub fn parent(&self) -> PageId {
        match self {
            Node::Internal(n) => n.parent(),
            Node::Leaf(n) => n.parent(),
        }
    }

    pub fn kind(&self) -> PageType {
        match self {
            Node::Internal(_) => PageType::BTreeInternal,
            Node::Leaf(_) => PageType::BTreeLeaf,
        }
    }
}

// ============================================================================
// Leaf
// ============================================================================

/// Leaf view: sorted `(key, locator)` entries plus the next-leaf link.
pub struct LeafNode<G> {
    block: BlockId,
    guard: G,
    layout: NodeLayout,
}

impl<G: Deref<Target = Page>> LeafNode<G> {
    /// Wrap a guard that must hold a leaf.
    pub fn from_guard(block: BlockId, guard: G, layout: NodeLayout) -> Result<Self> {
        match Node::from_guard(block, guard, layout)? {
            Node::Leaf(leaf) => Ok(leaf),
            Node::Internal(_) => Err(Error::corrupt(block, "expected leaf, found internal node")),
        }
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.guard.as_slice()
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.block.page
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.layout.count(self.data())
    }

    #[inline]
    pub fn parent(&self) -> PageId {
        self.layout.parent(self.data())
    }

    #[inline]
    pub fn next(&self) -> PageId {
        self.layout.next_leaf(self.data())
    }

    #[inline]
    pub fn key(&self, i: usize) -> &[u8] {
        self.layout.leaf_key(self.data(), i)
    }

    #[inline]
    pub fn locator(&self, i: usize) -> RecordLocator {
        self.layout.leaf_locator(self.data(), i)
    }

    /// Binary search for `key`: `Ok(i)` on a match, otherwise `Err(i)`
    /// with the position that keeps the entries sorted.
    pub fn find(&self, key: &[u8], cmp: &KeyComparator) -> std::result::Result<usize, usize> {
        let (mut lo, mut hi) = (0, self.count());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match cmp.compare(self.key(mid), key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    /// Copy out every entry in order.
    pub fn entries(&self) -> Vec<(Vec<u8>, RecordLocator)> {
        (0..self.count())
            .map(|i| (self.key(i).to_vec(), self.locator(i)))
            .collect()
    }
}

impl<G: DerefMut<Target = Page>> LeafNode<G> {
    /// Format the guarded block as an empty leaf.
    pub fn init(block: BlockId, mut guard: G, layout: NodeLayout, parent: PageId) -> Self {
        layout.init_node(guard.as_mut_slice(), PageType::BTreeLeaf, parent);
        Self { block, guard, layout }
    }

    #[inline]
    fn data_mut(&mut self) -> &mut [u8] {
        self.guard.as_mut_slice()
    }

    pub fn set_parent(&mut self, parent: PageId) {
        let layout = self.layout;
        layout.set_parent(self.data_mut(), parent);
    }

    pub fn set_next(&mut self, next: PageId) {
        let layout = self.layout;
        layout.set_next_leaf(self.data_mut(), next);
    }

    pub fn set_locator(&mut self, i: usize, locator: RecordLocator) {
        let layout = self.layout;
        layout.set_leaf_locator(self.data_mut(), i, locator);
    }

    pub fn insert_at(&mut self, i: usize, key: &[u8], locator: RecordLocator) {
        let layout = self.layout;
        layout.leaf_insert(self.data_mut(), i, key, locator);
    }

    pub fn remove_at(&mut self, i: usize) {
        let layout = self.layout;
        layout.leaf_remove(self.data_mut(), i);
    }

    /// Replace all entries with `entries`, which must be sorted.
    pub fn write_entries(&mut self, entries: &[(Vec<u8>, RecordLocator)]) {
        let layout = self.layout;
        let data = self.data_mut();
        for (i, (key, locator)) in entries.iter().enumerate() {
            layout.set_leaf_entry(data, i, key, *locator);
        }
        layout.set_count(data, entries.len());
    }

    /// Tag the block free, consuming the view.
    pub fn release(mut self) {
        let layout = self.layout;
        layout.init_free(self.data_mut());
    }
}

// ============================================================================
// Internal
// ============================================================================

/// Internal view: `count` separator keys and `count + 1` children.
pub struct InternalNode<G> {
    block: BlockId,
    guard: G,
    layout: NodeLayout,
}

impl<G: Deref<Target = Page>> InternalNode<G> {
    /// Wrap a guard that must hold an internal node.
    pub fn from_guard(block: BlockId, guard: G, layout: NodeLayout) -> Result<Self> {
        match Node::from_guard(block, guard, layout)? {
            Node::Internal(node) => Ok(node),
            Node::Leaf(_) => Err(Error::corrupt(block, "expected internal node, found leaf")),
        }
    }

    #[inline]
    fn data(&self) -> &[u8] {
        self.guard.as_slice()
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.block.page
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.layout.count(self.data())
    }

    #[inline]
    pub fn parent(&self) -> PageId {
        self.layout.parent(self.data())
    }

    #[inline]
    pub fn key(&self, i: usize) -> &[u8] {
        self.layout.internal_key(self.data(), i)
    }

    #[inline]
    pub fn child(&self, i: usize) -> PageId {
        self.layout.child(self.data(), i)
    }

    /// Index of the child to descend into for `key`: the child left of the
    /// first separator strictly greater than `key`, or the last child.
    pub fn child_index_for(&self, key: &[u8], cmp: &KeyComparator) -> usize {
        let (mut lo, mut hi) = (0, self.count());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if cmp.compare(self.key(mid), key) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo
    }

    /// Position of `child` among this node's children.
    pub fn position_of(&self, child: PageId) -> Option<usize> {
        (0..=self.count()).find(|&i| self.child(i) == child)
    }

    /// Same as [`position_of`](Self::position_of), as a corruption error
    /// when missing.
    pub fn require_position_of(&self, child: PageId) -> Result<usize> {
        self.position_of(child).ok_or_else(|| {
            Error::corrupt(self.block, format!("{} is not among its children", child))
        })
    }

    pub fn children(&self) -> Vec<PageId> {
        (0..=self.count()).map(|i| self.child(i)).collect()
    }

    /// Copy out child 0 and every `(key, right child)` pair.
    pub fn entries(&self) -> (PageId, Vec<(Vec<u8>, PageId)>) {
        let pairs = (0..self.count())
            .map(|i| (self.key(i).to_vec(), self.child(i + 1)))
            .collect();
        (self.child(0), pairs)
    }
}

impl<G: DerefMut<Target = Page>> InternalNode<G> {
    /// Format the guarded block as an internal node with no keys.
    pub fn init(block: BlockId, mut guard: G, layout: NodeLayout, parent: PageId) -> Self {
        layout.init_node(guard.as_mut_slice(), PageType::BTreeInternal, parent);
        Self { block, guard, layout }
    }

    #[inline]
    fn data_mut(&mut self) -> &mut [u8] {
        self.guard.as_mut_slice()
    }

    pub fn set_parent(&mut self, parent: PageId) {
        let layout = self.layout;
        layout.set_parent(self.data_mut(), parent);
    }

    pub fn set_key(&mut self, i: usize, key: &[u8]) {
        let layout = self.layout;
        layout.set_internal_key(self.data_mut(), i, key);
    }

    /// Insert `key` at `i` with `right` as the child after it.
    pub fn insert_at(&mut self, i: usize, key: &[u8], right: PageId) {
        let layout = self.layout;
        layout.internal_insert(self.data_mut(), i, key, right);
    }

    /// Remove key `i` and the child after it.
    pub fn remove_at(&mut self, i: usize) {
        let layout = self.layout;
        layout.internal_remove(self.data_mut(), i);
    }

    /// Prepend `child` and `key` as the new child 0 and key 0.
    pub fn push_front(&mut self, child: PageId, key: &[u8]) {
        let layout = self.layout;
        layout.internal_push_front(self.data_mut(), child, key);
    }

    /// Remove child 0 and key 0.
    pub fn pop_front(&mut self) {
        let layout = self.layout;
        layout.internal_pop_front(self.data_mut());
    }

    /// Replace all entries.
    pub fn write_entries(&mut self, first_child: PageId, pairs: &[(Vec<u8>, PageId)]) {
        let layout = self.layout;
        let data = self.data_mut();
        layout.set_child(data, 0, first_child);
        for (i, (key, child)) in pairs.iter().enumerate() {
            layout.set_internal_key(data, i, key);
            layout.set_child(data, i + 1, *child);
        }
        layout.set_count(data, pairs.len());
    }

    /// Tag the block free, consuming the view.
    pub fn release(mut self) {
        let layout = self.layout;
        layout.init_free(self.data_mut());
    }
}
