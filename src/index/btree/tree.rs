//! B+ tree over buffer pool blocks.
//!
//! # Structure
//! - Every node is one block of the tree's file; block numbers are
//!   allocated from a running count that only grows.
//! - Leaves are chained left to right through their next pointers.
//! - Every node records its parent, so splits and merges propagate upward
//!   without a descent stack.
//!
//! # Guards
//! Structural operations hold write guards on up to three distinct nodes
//! (node, sibling, parent) plus one child at a time while reparenting. A
//! block is never fetched while a guard on it is live.

use std::ops::{Bound, RangeBounds};

use tracing::{debug, trace, warn};

use crate::buffer::{BufferPool, PageReadGuard, PageWriteGuard};
use crate::common::{BlockId, Error, FileId, PageId, Result};
use crate::index::key::{KeyComparator, KeyKind, RecordLocator};
use crate::storage::page::PageType;

use super::layout::NodeLayout;
use super::node::{InternalNode, LeafNode, Node};
use super::scan::Scan;

type WriteNode<'a> = Node<PageWriteGuard<'a>>;
type WriteLeaf<'a> = LeafNode<PageWriteGuard<'a>>;
type WriteInternal<'a> = InternalNode<PageWriteGuard<'a>>;

/// Shape of a tree as seen by [`BPlusTree::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// Levels from root to leaves; a lone root leaf is height 1.
    pub height: usize,
    pub leaves: usize,
    pub internals: usize,
    pub entries: usize,
}

/// A disk-resident B+ tree mapping fixed-length keys to record locators.
///
/// The tree borrows its buffer pool; every block it touches goes through
/// the pool's guards. Its persistent state is the root block number and
/// the allocated block count, both of which change as it grows and shrinks
/// and must be saved by the caller to reopen it.
///
/// # Example
/// ```no_run
/// use blocktree::buffer::BufferPool;
/// use blocktree::index::{int_key, BPlusTree, KeyKind, RecordLocator};
///
/// let pool = BufferPool::new(16);
/// let file = pool.create_file("orders_pk.index")?;
/// let mut tree = BPlusTree::create(&pool, file, KeyKind::Int)?;
///
/// tree.insert(&int_key(42), RecordLocator::new(3, 128))?;
/// assert_eq!(tree.search(&int_key(42))?, Some(RecordLocator::new(3, 128)));
/// # Ok::<(), blocktree::Error>(())
/// ```
pub struct BPlusTree<'a> {
    pool: &'a BufferPool,
    file: FileId,
    root: PageId,
    block_count: u32,
    layout: NodeLayout,
    cmp: KeyComparator,
}

impl<'a> BPlusTree<'a> {
    /// Start a tree in an empty file: block 0 becomes an empty root leaf.
    pub fn create(pool: &'a BufferPool, file: FileId, kind: KeyKind) -> Result<Self> {
        let cmp = KeyComparator::new(kind)?;
        let layout = NodeLayout::new(kind.key_len())?;

        let mut tree = Self {
            pool,
            file,
            root: PageId::new(0),
            block_count: 0,
            layout,
            cmp,
        };
        let (root, guard) = tree.allocate()?;
        LeafNode::init(tree.block(root), guard, layout, PageId::INVALID);
        tree.root = root;

        debug!(file = %file, kind = %kind, max = layout.max_entries(), "created tree");
        Ok(tree)
    }

    /// Reopen a tree whose root and block count were saved earlier.
    ///
    /// A stale `block_count` is raised to cover every block the file holds
    /// on disk or in the pool, so allocation never reuses a live block.
    ///
    /// # Errors
    /// `Error::CorruptNode` if `root` is not a node without a parent.
    pub fn open(
        pool: &'a BufferPool,
        file: FileId,
        kind: KeyKind,
        root: PageId,
        block_count: u32,
    ) -> Result<Self> {
        let cmp = KeyComparator::new(kind)?;
        let layout = NodeLayout::new(kind.key_len())?;
        let in_use = pool.file_page_count(file)?.max(pool.cached_page_end(file));

        let tree = Self {
            pool,
            file,
            root,
            block_count: block_count.max(in_use),
            layout,
            cmp,
        };

        let node = tree.read_node(root)?;
        if node.parent().is_valid() {
            return Err(Error::corrupt(tree.block(root), "root has a parent"));
        }

        debug!(file = %file, root = %root, blocks = tree.block_count, "opened tree");
        Ok(tree)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    pub fn root(&self) -> PageId {
        self.root
    }

    /// Blocks allocated so far, including freed ones.
    #[inline]
    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    #[inline]
    pub fn file(&self) -> FileId {
        self.file
    }

    #[inline]
    pub fn layout(&self) -> NodeLayout {
        self.layout
    }

    #[inline]
    pub fn comparator(&self) -> &KeyComparator {
        &self.cmp
    }

    /// Tag of the root block.
    pub fn root_kind(&self) -> Result<PageType> {
        Ok(self.read_node(self.root)?.kind())
    }

    /// Number of keys in the root.
    pub fn root_key_count(&self) -> Result<usize> {
        Ok(self.read_node(self.root)?.count())
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Look up the locator stored for `key`.
    ///
    /// A missing key is `Ok(None)`.
    pub fn search(&self, key: &[u8]) -> Result<Option<RecordLocator>> {
        let key = self.cmp.normalize(key)?;
        let leaf_id = self.find_leaf(&key)?;
        let leaf = LeafNode::from_guard(self.block(leaf_id), self.fetch_read(leaf_id)?, self.layout)?;

        Ok(leaf.find(&key, &self.cmp).ok().map(|i| leaf.locator(i)))
    }

    /// Ordered scan over every entry.
    pub fn iter(&self) -> Result<Scan<'a>> {
        self.range::<Vec<u8>, _>(..)
    }

    /// Ordered scan over the entries whose keys fall in `range`.
    ///
    /// Follows the leaf chain; no internal node is visited after the first
    /// descent.
    ///
    /// ```ignore
    /// for entry in tree.range(int_key(10)..int_key(20))? {
    ///     let (key, locator) = entry?;
    /// }
    /// ```
    pub fn range<K, R>(&self, range: R) -> Result<Scan<'a>>
    where
        K: AsRef<[u8]>,
        R: RangeBounds<K>,
    {
        let lower = self.normalize_bound(range.start_bound())?;
        let upper = self.normalize_bound(range.end_bound())?;

        let start = match &lower {
            Bound::Included(key) | Bound::Excluded(key) => self.find_leaf(key)?,
            Bound::Unbounded => self.leftmost_leaf()?,
        };

        Ok(Scan::new(
            self.pool, self.file, self.layout, self.cmp, start, lower, upper,
        ))
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Store `locator` under `key`, replacing any locator already stored.
    pub fn insert(&mut self, key: &[u8], locator: RecordLocator) -> Result<()> {
        let key = self.cmp.normalize(key)?;
        let leaf_id = self.find_leaf(&key)?;
        let mut leaf = self.write_leaf(leaf_id)?;

        let pos = match leaf.find(&key, &self.cmp) {
            Ok(i) => {
                leaf.set_locator(i, locator);
                trace!(leaf = %leaf_id, "replaced locator");
                return Ok(());
            }
            Err(pos) => pos,
        };

        if leaf.count() < self.layout.max_entries() {
            leaf.insert_at(pos, &key, locator);
            return Ok(());
        }

        // Overflow: split into the old leaf (MIN entries) and a new right
        // sibling holding the rest.
        let (new_id, guard) = self.allocate()?;
        let mut entries = leaf.entries();
        entries.insert(pos, (key, locator));
        let split = self.layout.min_leaf_entries();

        let parent = leaf.parent();
        let mut sibling = LeafNode::init(self.block(new_id), guard, self.layout, parent);
        sibling.write_entries(&entries[split..]);
        sibling.set_next(leaf.next());
        leaf.write_entries(&entries[..split]);
        leaf.set_next(new_id);
        drop(sibling);
        drop(leaf);

        let separator = entries[split].0.clone();
        debug!(leaf = %leaf_id, sibling = %new_id, left = split, right = entries.len() - split, "split leaf");

        self.insert_into_parent(leaf_id, separator, new_id, parent)
    }

    /// Hang `right` after `left` in `parent` under `separator`, splitting
    /// upward as long as parents overflow.
    fn insert_into_parent(
        &mut self,
        mut left: PageId,
        mut separator: Vec<u8>,
        mut right: PageId,
        mut parent_id: PageId,
    ) -> Result<()> {
        loop {
            if !parent_id.is_valid() {
                return self.grow_root(left, separator, right);
            }

            let mut parent = self.write_internal(parent_id)?;
            let idx = parent.require_position_of(left)?;

            if parent.count() < self.layout.max_entries() {
                parent.insert_at(idx, &separator, right);
                return Ok(());
            }

            // Internal overflow: left keeps floor(MAX/2) keys, the middle
            // key moves up, the right node takes the rest.
            let (new_id, guard) = self.allocate()?;
            let (first_child, mut pairs) = parent.entries();
            pairs.insert(idx, (separator, right));
            let mid = self.layout.min_internal_keys();

            let grandparent = parent.parent();
            let moved = pairs.split_off(mid + 1);
            let (up_key, up_child) = pairs.pop().ok_or_else(|| {
                Error::corrupt(self.block(parent_id), "split of an empty internal node")
            })?;

            let mut sibling = InternalNode::init(self.block(new_id), guard, self.layout, grandparent);
            sibling.write_entries(up_child, &moved);
            parent.write_entries(first_child, &pairs);
            drop(sibling);
            drop(parent);

            debug!(node = %parent_id, sibling = %new_id, left = pairs.len(), right = moved.len(), "split internal node");

            self.reparent(
                std::iter::once(up_child).chain(moved.iter().map(|(_, c)| *c)),
                new_id,
            )?;

            left = parent_id;
            separator = up_key;
            right = new_id;
            parent_id = grandparent;
        }
    }

    /// Put a new internal root above `left` and `right`.
    fn grow_root(&mut self, left: PageId, separator: Vec<u8>, right: PageId) -> Result<()> {
        let (root_id, guard) = self.allocate()?;
        let mut root = InternalNode::init(self.block(root_id), guard, self.layout, PageId::INVALID);
        root.write_entries(left, &[(separator, right)]);
        drop(root);

        self.reparent([left, right], root_id)?;
        self.root = root_id;

        debug!(root = %root_id, left = %left, right = %right, "new root");
        Ok(())
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove `key`. Returns whether it was present.
    ///
    /// A missing key leaves every block untouched.
    ///
    /// # Errors
    /// `Error::UnsupportedRebalance` if an underflowing node's sibling holds
    /// exactly the minimum. The key is removed from its leaf regardless.
    pub fn delete(&mut self, key: &[u8]) -> Result<bool> {
        let key = self.cmp.normalize(key)?;
        let leaf_id = self.find_leaf(&key)?;
        let mut leaf = self.write_leaf(leaf_id)?;

        let Ok(pos) = leaf.find(&key, &self.cmp) else {
            return Ok(false);
        };
        leaf.remove_at(pos);

        let underflow =
            leaf.parent().is_valid() && leaf.count() < self.layout.min_leaf_entries();
        drop(leaf);

        if underflow {
            self.rebalance(leaf_id)?;
        }
        Ok(true)
    }

    /// Restore the minimum at `node_id` and every ancestor a merge leaves
    /// short.
    fn rebalance(&mut self, mut node_id: PageId) -> Result<()> {
        loop {
            let node = self.write_node(node_id)?;
            let parent_id = node.parent();

            if !parent_id.is_valid() {
                if let Node::Internal(root) = node {
                    if root.count() == 0 {
                        self.collapse_root(root)?;
                    }
                }
                return Ok(());
            }
            if node.count() >= self.min_for(&node) {
                return Ok(());
            }

            let mut parent = self.write_internal(parent_id)?;
            let idx = parent.require_position_of(node_id)?;

            // Prefer the following sibling, else the preceding one
            let (sibling_id, sep_idx, sibling_is_right) = if idx < parent.count() {
                (parent.child(idx + 1), idx, true)
            } else if idx > 0 {
                (parent.child(idx - 1), idx - 1, false)
            } else {
                return Err(Error::corrupt(self.block(parent_id), "non-root node without siblings"));
            };

            let merged = match node {
                Node::Leaf(leaf) => {
                    let sibling = self.write_leaf(sibling_id)?;
                    self.rebalance_leaf(leaf, sibling, &mut parent, sep_idx, sibling_is_right)?
                }
                Node::Internal(internal) => {
                    let sibling = self.write_internal(sibling_id)?;
                    self.rebalance_internal(internal, sibling, &mut parent, sep_idx, sibling_is_right)?
                }
            };

            if !merged {
                return Ok(());
            }

            if !parent.parent().is_valid() {
                if parent.count() == 0 {
                    self.collapse_root(parent)?;
                }
                return Ok(());
            }
            if parent.count() >= self.layout.min_internal_keys() {
                return Ok(());
            }

            drop(parent);
            node_id = parent_id;
        }
    }

    /// Merge or redistribute an underflowing leaf with its sibling.
    /// Returns true on a merge, which removed one entry from `parent`.
    fn rebalance_leaf(
        &self,
        node: WriteLeaf<'a>,
        sibling: WriteLeaf<'a>,
        parent: &mut WriteInternal<'a>,
        sep_idx: usize,
        sibling_is_right: bool,
    ) -> Result<bool> {
        let max = self.layout.max_entries();
        let min = self.layout.min_leaf_entries();

        if node.count() + sibling.count() <= max {
            let (left, right) = if sibling_is_right {
                (node, sibling)
            } else {
                (sibling, node)
            };
            self.merge_leaves(left, right, parent, sep_idx);
            return Ok(true);
        }

        if sibling.count() == min {
            return Err(self.unsupported(node.page_id(), sibling.page_id()));
        }

        let (mut node, mut sibling) = (node, sibling);
        if sibling_is_right {
            node.insert_at(node.count(), sibling.key(0), sibling.locator(0));
            sibling.remove_at(0);
            parent.set_key(sep_idx, sibling.key(0));
        } else {
            let last = sibling.count() - 1;
            let key = sibling.key(last).to_vec();
            node.insert_at(0, &key, sibling.locator(last));
            sibling.remove_at(last);
            parent.set_key(sep_idx, &key);
        }

        debug!(leaf = %node.page_id(), from = %sibling.page_id(), "redistributed leaf entry");
        Ok(false)
    }

    /// Merge or redistribute an underflowing internal node with its
    /// sibling. Returns true on a merge.
    fn rebalance_internal(
        &self,
        node: WriteInternal<'a>,
        sibling: WriteInternal<'a>,
        parent: &mut WriteInternal<'a>,
        sep_idx: usize,
        sibling_is_right: bool,
    ) -> Result<bool> {
        let max = self.layout.max_entries();
        let min = self.layout.min_internal_keys();

        // The separator comes down into the merged node
        if node.count() + sibling.count() + 1 <= max {
            let (left, right) = if sibling_is_right {
                (node, sibling)
            } else {
                (sibling, node)
            };
            self.merge_internals(left, right, parent, sep_idx)?;
            return Ok(true);
        }

        if sibling.count() == min {
            return Err(self.unsupported(node.page_id(), sibling.page_id()));
        }

        // Rotate one child through the parent separator
        let (mut node, mut sibling) = (node, sibling);
        let separator = parent.key(sep_idx).to_vec();
        let moved = if sibling_is_right {
            let moved = sibling.child(0);
            let up = sibling.key(0).to_vec();
            node.insert_at(node.count(), &separator, moved);
            sibling.pop_front();
            parent.set_key(sep_idx, &up);
            moved
        } else {
            let last = sibling.count() - 1;
            let moved = sibling.child(last + 1);
            let up = sibling.key(last).to_vec();
            node.push_front(moved, &separator);
            sibling.remove_at(last);
            parent.set_key(sep_idx, &up);
            moved
        };
        let node_id = node.page_id();
        debug!(node = %node_id, from = %sibling.page_id(), "redistributed internal entry");
        drop(node);
        drop(sibling);

        self.reparent([moved], node_id)?;
        Ok(false)
    }

    /// Append `right` to `left`, unlink it, and free its block.
    fn merge_leaves(
        &self,
        mut left: WriteLeaf<'a>,
        right: WriteLeaf<'a>,
        parent: &mut WriteInternal<'a>,
        sep_idx: usize,
    ) {
        let base = left.count();
        for (i, (key, locator)) in right.entries().into_iter().enumerate() {
            left.insert_at(base + i, &key, locator);
        }
        left.set_next(right.next());

        let (left_id, right_id) = (left.page_id(), right.page_id());
        right.release();
        parent.remove_at(sep_idx);

        debug!(left = %left_id, right = %right_id, entries = left.count(), "merged leaves");
    }

    /// Pull the separator down into `left`, append `right`, and free it.
    fn merge_internals(
        &self,
        mut left: WriteInternal<'a>,
        right: WriteInternal<'a>,
        parent: &mut WriteInternal<'a>,
        sep_idx: usize,
    ) -> Result<()> {
        let separator = parent.key(sep_idx).to_vec();
        let (first, pairs) = right.entries();

        left.insert_at(left.count(), &separator, first);
        for (key, child) in &pairs {
            left.insert_at(left.count(), key, *child);
        }

        let (left_id, right_id) = (left.page_id(), right.page_id());
        let keys = left.count();
        right.release();
        parent.remove_at(sep_idx);
        drop(left);

        self.reparent(
            std::iter::once(first).chain(pairs.iter().map(|(_, c)| *c)),
            left_id,
        )?;

        debug!(left = %left_id, right = %right_id, keys, "merged internal nodes");
        Ok(())
    }

    /// Replace an internal root with no keys by its only child.
    fn collapse_root(&mut self, root: WriteInternal<'a>) -> Result<()> {
        let old_root = root.page_id();
        let child = root.child(0);
        root.release();

        match self.write_node(child)? {
            Node::Internal(mut n) => n.set_parent(PageId::INVALID),
            Node::Leaf(mut n) => n.set_parent(PageId::INVALID),
        }
        self.root = child;

        debug!(old = %old_root, new = %child, "root collapsed");
        Ok(())
    }

    fn unsupported(&self, node: PageId, sibling: PageId) -> Error {
        warn!(node = %node, sibling = %sibling, "sibling holds exactly the minimum; rebalance unsupported");
        Error::UnsupportedRebalance {
            block: self.block(node),
            sibling: self.block(sibling),
        }
    }

    // ========================================================================
    // Validate
    // ========================================================================

    /// Walk the whole tree and check its structure: tags, key order and
    /// separator bounds, occupancy, parent pointers, equal leaf depth, and
    /// that the leaf chain visits exactly the leaves of the walk in order.
    ///
    /// # Errors
    /// `Error::CorruptNode` naming the first offending block.
    pub fn validate(&self) -> Result<TreeStats> {
        let mut stats = TreeStats::default();
        let mut leaves = Vec::new();
        let mut leaf_depth = None;

        self.validate_node(
            self.root,
            PageId::INVALID,
            None,
            None,
            1,
            &mut stats,
            &mut leaves,
            &mut leaf_depth,
        )?;
        stats.height = leaf_depth.unwrap_or(1);

        // The chain must link the walk's leaves in order and end there
        for (i, &leaf_id) in leaves.iter().enumerate() {
            let leaf = LeafNode::from_guard(self.block(leaf_id), self.fetch_read(leaf_id)?, self.layout)?;
            let expected = leaves.get(i + 1).copied().unwrap_or(PageId::INVALID);
            if leaf.next() != expected {
                return Err(Error::corrupt(
                    self.block(leaf_id),
                    format!("next leaf is {}, expected {}", leaf.next(), expected),
                ));
            }
        }

        Ok(stats)
    }

    #[allow(clippy::too_many_arguments)]
    fn validate_node(
        &self,
        id: PageId,
        expected_parent: PageId,
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
        depth: usize,
        stats: &mut TreeStats,
        leaves: &mut Vec<PageId>,
        leaf_depth: &mut Option<usize>,
    ) -> Result<()> {
        let block = self.block(id);
        let node = self.read_node(id)?;
        let is_root = id == self.root;

        if node.parent() != expected_parent {
            return Err(Error::corrupt(
                block,
                format!("parent is {}, expected {}", node.parent(), expected_parent),
            ));
        }
        let count = node.count();
        if count > self.layout.max_entries() || (!is_root && count < self.min_for(&node)) {
            return Err(Error::corrupt(block, format!("{} entries out of bounds", count)));
        }

        let keys: Vec<Vec<u8>> = match &node {
            Node::Leaf(n) => (0..count).map(|i| n.key(i).to_vec()).collect(),
            Node::Internal(n) => (0..count).map(|i| n.key(i).to_vec()).collect(),
        };
        self.check_keys(block, &keys, lower, upper)?;

        match node {
            Node::Leaf(_) => {
                stats.leaves += 1;
                stats.entries += count;
                leaves.push(id);
                match *leaf_depth {
                    None => *leaf_depth = Some(depth),
                    Some(d) if d != depth => {
                        return Err(Error::corrupt(block, "leaves at different depths"));
                    }
                    Some(_) => {}
                }
            }
            Node::Internal(n) => {
                stats.internals += 1;
                if count == 0 {
                    return Err(Error::corrupt(block, "internal node without keys"));
                }
                let children = n.children();
                drop(n);

                for (i, child) in children.into_iter().enumerate() {
                    let lo = if i == 0 { lower } else { Some(keys[i - 1].as_slice()) };
                    let hi = if i == count { upper } else { Some(keys[i].as_slice()) };
                    self.validate_node(child, id, lo, hi, depth + 1, stats, leaves, leaf_depth)?;
                }
            }
        }
        Ok(())
    }

    /// Keys strictly ascending, each in `[lower, upper)`.
    fn check_keys(
        &self,
        block: BlockId,
        keys: &[Vec<u8>],
        lower: Option<&[u8]>,
        upper: Option<&[u8]>,
    ) -> Result<()> {
        use std::cmp::Ordering::*;

        for pair in keys.windows(2) {
            if self.cmp.compare(&pair[0], &pair[1]) != Less {
                return Err(Error::corrupt(block, "keys out of order"));
            }
        }
        for key in keys {
            if lower.is_some_and(|lo| self.cmp.compare(key, lo) == Less)
                || upper.is_some_and(|hi| self.cmp.compare(key, hi) != Less)
            {
                return Err(Error::corrupt(block, "key outside separator bounds"));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Internal: navigation and block access
    // ========================================================================

    /// Descend from the root to the leaf that owns `key`.
    fn find_leaf(&self, key: &[u8]) -> Result<PageId> {
        let mut id = self.root;
        loop {
            match self.read_node(id)? {
                Node::Leaf(_) => return Ok(id),
                Node::Internal(n) => id = n.child(n.child_index_for(key, &self.cmp)),
            }
        }
    }

    fn leftmost_leaf(&self) -> Result<PageId> {
        let mut id = self.root;
        loop {
            match self.read_node(id)? {
                Node::Leaf(_) => return Ok(id),
                Node::Internal(n) => id = n.child(0),
            }
        }
    }

    fn normalize_bound<K: AsRef<[u8]>>(&self, bound: Bound<&K>) -> Result<Bound<Vec<u8>>> {
        Ok(match bound {
            Bound::Included(k) => Bound::Included(self.cmp.normalize(k.as_ref())?),
            Bound::Excluded(k) => Bound::Excluded(self.cmp.normalize(k.as_ref())?),
            Bound::Unbounded => Bound::Unbounded,
        })
    }

    fn min_for<G>(&self, node: &Node<G>) -> usize {
        match node {
            Node::Leaf(_) => self.layout.min_leaf_entries(),
            Node::Internal(_) => self.layout.min_internal_keys(),
        }
    }

    /// Point each of `children` at `parent`.
    fn reparent<I>(&self, children: I, parent: PageId) -> Result<()>
    where
        I: IntoIterator<Item = PageId>,
    {
        for child in children {
            match self.write_node(child)? {
                Node::Internal(mut n) => n.set_parent(parent),
                Node::Leaf(mut n) => n.set_parent(parent),
            }
        }
        Ok(())
    }

    /// Name and bind the next block of the file.
    ///
    /// Plain `new_page` is enough: the nodes being split are pinned by
    /// live guards and cannot be evicted.
    fn allocate(&mut self) -> Result<(PageId, PageWriteGuard<'a>)> {
        let id = PageId::new(self.block_count);
        let guard = self.pool.new_page(self.block(id))?;
        self.block_count += 1;
        Ok((id, guard))
    }

    #[inline]
    fn block(&self, id: PageId) -> BlockId {
        BlockId::new(self.file, id)
    }

    fn fetch_read(&self, id: PageId) -> Result<PageReadGuard<'a>> {
        self.pool.fetch_page_read(self.block(id))
    }

    fn read_node(&self, id: PageId) -> Result<Node<PageReadGuard<'a>>> {
        Node::from_guard(self.block(id), self.fetch_read(id)?, self.layout)
    }

    fn write_node(&self, id: PageId) -> Result<WriteNode<'a>> {
        let guard = self.pool.fetch_page_write(self.block(id))?;
        Node::from_guard(self.block(id), guard, self.layout)
    }

    fn write_leaf(&self, id: PageId) -> Result<WriteLeaf<'a>> {
        let guard = self.pool.fetch_page_write(self.block(id))?;
        LeafNode::from_guard(self.block(id), guard, self.layout)
    }

    fn write_internal(&self, id: PageId) -> Result<WriteInternal<'a>> {
        let guard = self.pool.fetch_page_write(self.block(id))?;
        InternalNode::from_guard(self.block(id), guard, self.layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::key::int_key;
    use tempfile::{tempdir, TempDir};

    fn setup(pool_size: usize) -> (BufferPool, FileId, TempDir) {
        let dir = tempdir().unwrap();
        let pool = BufferPool::new(pool_size);
        let file = pool.create_file(dir.path().join("t.index")).unwrap();
        (pool, file, dir)
    }

    fn loc(k: i32) -> RecordLocator {
        RecordLocator::new(k as u32, (k as u32) * 2)
    }

    #[test]
    fn test_empty_tree() {
        let (pool, file, _dir) = setup(8);
        let tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();

        assert_eq!(tree.root(), PageId::new(0));
        assert_eq!(tree.block_count(), 1);
        assert_eq!(tree.root_kind().unwrap(), PageType::BTreeLeaf);
        assert_eq!(tree.search(&int_key(1)).unwrap(), None);
        assert_eq!(tree.validate().unwrap().entries, 0);
    }

    #[test]
    fn test_upsert_replaces_locator() {
        let (pool, file, _dir) = setup(8);
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();

        tree.insert(&int_key(5), loc(1)).unwrap();
        tree.insert(&int_key(5), loc(2)).unwrap();

        assert_eq!(tree.search(&int_key(5)).unwrap(), Some(loc(2)));
        assert_eq!(tree.validate().unwrap().entries, 1);
    }

    #[test]
    fn test_first_split_shape() {
        let (pool, file, _dir) = setup(8);
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
        let max = tree.layout().max_entries() as i32;

        for k in 1..=max + 1 {
            tree.insert(&int_key(k), loc(k)).unwrap();
        }

        assert_eq!(tree.root_kind().unwrap(), PageType::BTreeInternal);
        assert_eq!(tree.root_key_count().unwrap(), 1);

        let stats = tree.validate().unwrap();
        assert_eq!(stats.height, 2);
        assert_eq!(stats.leaves, 2);
        assert_eq!(stats.entries, (max + 1) as usize);

        // Old leaf keeps MIN, so the separator is key MIN + 1
        let min = tree.layout().min_leaf_entries() as i32;
        let root = tree.write_internal(tree.root()).unwrap();
        assert_eq!(root.key(0), &int_key(min + 1)[..]);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let (pool, file, _dir) = setup(8);
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
        tree.insert(&int_key(1), loc(1)).unwrap();
        pool.flush_all_pages().unwrap();

        assert!(!tree.delete(&int_key(2)).unwrap());
        assert_eq!(pool.is_dirty(BlockId::new(file, tree.root())), Some(false));
    }

    #[test]
    fn test_malformed_key_leaves_tree_untouched() {
        let (pool, file, _dir) = setup(8);
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();

        assert!(matches!(
            tree.insert(&[1, 2], loc(1)),
            Err(Error::MalformedKey(_))
        ));
        assert!(matches!(tree.search(&[0; 5]), Err(Error::MalformedKey(_))));
        assert_eq!(tree.validate().unwrap().entries, 0);
    }

    #[test]
    fn test_delete_down_to_single_leaf() {
        let (pool, file, _dir) = setup(16);
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Char(255)).unwrap();
        let keys: Vec<Vec<u8>> = (0..200).map(|k| format!("{:05}", k).into_bytes()).collect();

        for (i, key) in keys.iter().enumerate() {
            tree.insert(key, loc(i as i32)).unwrap();
        }
        assert!(tree.validate().unwrap().height >= 3);

        for (i, key) in keys.iter().enumerate() {
            assert!(tree.delete(key).unwrap());
            if i % 17 == 0 {
                tree.validate().unwrap();
            }
        }

        let stats = tree.validate().unwrap();
        assert_eq!(stats.height, 1);
        assert_eq!(stats.entries, 0);
        assert_eq!(tree.root_kind().unwrap(), PageType::BTreeLeaf);
    }

    #[test]
    fn test_open_with_stale_block_count_allocates_fresh_blocks() {
        let (pool, file, _dir) = setup(8);
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
        tree.insert(&int_key(0), loc(0)).unwrap();
        drop(tree);

        // Block 0 is only in the pool; the saved count claims nothing exists
        let mut tree = BPlusTree::open(&pool, file, KeyKind::Int, PageId::new(0), 0).unwrap();
        assert_eq!(tree.block_count(), 1);

        let max = tree.layout().max_entries() as i32;
        for k in 1..=max {
            tree.insert(&int_key(k), loc(k)).unwrap();
        }
        assert_eq!(tree.root_kind().unwrap(), PageType::BTreeInternal);
        assert_eq!(tree.block_count(), 3);
        assert_eq!(tree.validate().unwrap().entries, (max + 1) as usize);
    }

    #[test]
    fn test_open_rejects_non_root() {
        let (pool, file, _dir) = setup(8);
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
        let max = tree.layout().max_entries() as i32;
        for k in 0..=max {
            tree.insert(&int_key(k), loc(k)).unwrap();
        }
        // Block 0 is now a leaf under the new root
        let blocks = tree.block_count();
        assert!(matches!(
            BPlusTree::open(&pool, file, KeyKind::Int, PageId::new(0), blocks),
            Err(Error::CorruptNode { .. })
        ));
    }
}
