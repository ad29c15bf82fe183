//! Node Layout Codec - byte offsets of B+ tree nodes.
//!
//! # Block Layout
//! ```text
//! Common header (9 bytes):
//! ┌─────┬────────────┬─────────────┐
//! │ tag │ key count  │ parent      │
//! │ 1B  │ 4B (BE)    │ 4B (BE)     │
//! └─────┴────────────┴─────────────┘
//!
//! Leaf (entries from byte 13):
//! ┌────────┬──────────┬──────────────────────────┬──────────────────────────┬───
//! │ header │ next 4B  │ block 4B │ offset 4B │ key │ block 4B │ offset 4B │ key │ ...
//! └────────┴──────────┴──────────────────────────┴──────────────────────────┴───
//!
//! Internal (entries from byte 9):
//! ┌────────┬──────────┬─────┬──────────┬─────┬──────────┬───
//! │ header │ child 0  │ key0│ child 1  │ key1│ child 2  │ ...
//! └────────┴──────────┴─────┴──────────┴─────┴──────────┴───
//! ```
//!
//! All integers are big-endian. `PageId::INVALID` in the parent slot marks
//! the root, in the next slot the last leaf.
//!
//! Nothing outside this module computes a node offset.

use crate::common::config::{MAX_CHAR_KEY_LENGTH, PAGE_SIZE};
use crate::common::{Error, PageId, Result};
use crate::index::key::RecordLocator;
use crate::storage::page::PageType;

const COUNT_OFFSET: usize = 1;
const PARENT_OFFSET: usize = 5;
const NEXT_OFFSET: usize = 9;

/// First internal entry (child 0).
const INTERNAL_ENTRIES_OFFSET: usize = 9;
/// First leaf entry.
const LEAF_ENTRIES_OFFSET: usize = 13;

/// Bytes reserved ahead of entries when sizing nodes.
pub const NODE_HEADER_SIZE: usize = LEAF_ENTRIES_OFFSET;

const POINTER_SIZE: usize = 4;
const LOCATOR_SIZE: usize = 8;

/// Offsets and capacities for nodes holding keys of one length.
///
/// Computed once per tree; every node of the tree shares it.
///
/// # Capacity
/// `MAX = (PAGE_SIZE - 13) / (8 + key_len)` entries for both kinds. A leaf
/// needs at least `ceil(MAX / 2)` entries, an internal node at least
/// `floor(MAX / 2)` keys. With those minimums a node one short of its
/// minimum and a sibling at exactly its minimum always fit in one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    key_len: usize,
    max: usize,
    min_leaf: usize,
    min_internal: usize,
}

impl NodeLayout {
    /// Layout for keys of `key_len` bytes.
    ///
    /// # Errors
    /// `Error::InvalidKeyColumn` unless `1 <= key_len <= 255`.
    pub fn new(key_len: usize) -> Result<Self> {
        if key_len == 0 || key_len > MAX_CHAR_KEY_LENGTH {
            return Err(Error::InvalidKeyColumn(format!(
                "key length {} outside 1..={}",
                key_len, MAX_CHAR_KEY_LENGTH
            )));
        }

        let max = (PAGE_SIZE - NODE_HEADER_SIZE) / (LOCATOR_SIZE + key_len);
        Ok(Self {
            key_len,
            max,
            min_leaf: max.div_ceil(2),
            min_internal: max / 2,
        })
    }

    #[inline]
    pub fn key_len(&self) -> usize {
        self.key_len
    }

    /// Most entries a node holds at rest.
    #[inline]
    pub fn max_entries(&self) -> usize {
        self.max
    }

    /// Fewest entries a non-root leaf holds at rest.
    #[inline]
    pub fn min_leaf_entries(&self) -> usize {
        self.min_leaf
    }

    /// Fewest keys a non-root internal node holds at rest.
    #[inline]
    pub fn min_internal_keys(&self) -> usize {
        self.min_internal
    }

    // ========================================================================
    // Header
    // ========================================================================

    #[inline]
    pub fn tag(&self, data: &[u8]) -> PageType {
        PageType::of(data)
    }

    #[inline]
    pub fn count(&self, data: &[u8]) -> usize {
        read_u32(data, COUNT_OFFSET) as usize
    }

    #[inline]
    pub fn set_count(&self, data: &mut [u8], count: usize) {
        debug_assert!(count <= self.max);
        write_u32(data, COUNT_OFFSET, count as u32);
    }

    #[inline]
    pub fn parent(&self, data: &[u8]) -> PageId {
        PageId::new(read_u32(data, PARENT_OFFSET))
    }

    #[inline]
    pub fn set_parent(&self, data: &mut [u8], parent: PageId) {
        write_u32(data, PARENT_OFFSET, parent.0);
    }

    /// Next leaf in key order. Leaf only.
    #[inline]
    pub fn next_leaf(&self, data: &[u8]) -> PageId {
        PageId::new(read_u32(data, NEXT_OFFSET))
    }

    #[inline]
    pub fn set_next_leaf(&self, data: &mut [u8], next: PageId) {
        write_u32(data, NEXT_OFFSET, next.0);
    }

    /// Zero the block and write an empty node header.
    pub fn init_node(&self, data: &mut [u8], kind: PageType, parent: PageId) {
        debug_assert!(kind.is_node());
        data.fill(0);
        kind.write_to(data);
        self.set_count(data, 0);
        self.set_parent(data, parent);
        if kind == PageType::BTreeLeaf {
            self.set_next_leaf(data, PageId::INVALID);
        }
    }

    /// Zero the block and tag it free.
    pub fn init_free(&self, data: &mut [u8]) {
        data.fill(0);
        PageType::Free.write_to(data);
    }

    // ========================================================================
    // Leaf entries
    // ========================================================================

    #[inline]
    fn leaf_entry_size(&self) -> usize {
        LOCATOR_SIZE + self.key_len
    }

    #[inline]
    fn leaf_entry_offset(&self, i: usize) -> usize {
        LEAF_ENTRIES_OFFSET + i * self.leaf_entry_size()
    }

    pub fn leaf_key<'d>(&self, data: &'d [u8], i: usize) -> &'d [u8] {
        let start = self.leaf_entry_offset(i) + LOCATOR_SIZE;
        &data[start..start + self.key_len]
    }

    pub fn leaf_locator(&self, data: &[u8], i: usize) -> RecordLocator {
        let start = self.leaf_entry_offset(i);
        RecordLocator::new(
            read_u32(data, start),
            read_u32(data, start + POINTER_SIZE),
        )
    }

    pub fn set_leaf_locator(&self, data: &mut [u8], i: usize, locator: RecordLocator) {
        let start = self.leaf_entry_offset(i);
        write_u32(data, start, locator.block);
        write_u32(data, start + POINTER_SIZE, locator.offset);
    }

    /// Overwrite entry `i` in place. The count is not touched.
    pub fn set_leaf_entry(&self, data: &mut [u8], i: usize, key: &[u8], locator: RecordLocator) {
        debug_assert_eq!(key.len(), self.key_len);
        self.set_leaf_locator(data, i, locator);
        let start = self.leaf_entry_offset(i) + LOCATOR_SIZE;
        data[start..start + self.key_len].copy_from_slice(key);
    }

    /// Insert an entry at `i`, shifting later entries right.
    pub fn leaf_insert(&self, data: &mut [u8], i: usize, key: &[u8], locator: RecordLocator) {
        let count = self.count(data);
        debug_assert!(i <= count && count < self.max);

        let start = self.leaf_entry_offset(i);
        let end = self.leaf_entry_offset(count);
        data.copy_within(start..end, start + self.leaf_entry_size());
        self.set_leaf_entry(data, i, key, locator);
        self.set_count(data, count + 1);
    }

    /// Remove entry `i`, shifting later entries left.
    pub fn leaf_remove(&self, data: &mut [u8], i: usize) {
        let count = self.count(data);
        debug_assert!(i < count);

        let start = self.leaf_entry_offset(i);
        let end = self.leaf_entry_offset(count);
        data.copy_within(start + self.leaf_entry_size()..end, start);
        self.set_count(data, count - 1);
    }

    // ========================================================================
    // Internal entries
    // ========================================================================

    #[inline]
    fn internal_stride(&self) -> usize {
        POINTER_SIZE + self.key_len
    }

    #[inline]
    fn child_offset(&self, i: usize) -> usize {
        INTERNAL_ENTRIES_OFFSET + i * self.internal_stride()
    }

    /// One past the last child of a node with `count` keys.
    #[inline]
    fn internal_end(&self, count: usize) -> usize {
        self.child_offset(count) + POINTER_SIZE
    }

    #[inline]
    fn internal_key_offset(&self, i: usize) -> usize {
        self.child_offset(i) + POINTER_SIZE
    }

    pub fn child(&self, data: &[u8], i: usize) -> PageId {
        PageId::new(read_u32(data, self.child_offset(i)))
    }

    pub fn set_child(&self, data: &mut [u8], i: usize, child: PageId) {
        write_u32(data, self.child_offset(i), child.0);
    }

    pub fn internal_key<'d>(&self, data: &'d [u8], i: usize) -> &'d [u8] {
        let start = self.internal_key_offset(i);
        &data[start..start + self.key_len]
    }

    pub fn set_internal_key(&self, data: &mut [u8], i: usize, key: &[u8]) {
        debug_assert_eq!(key.len(), self.key_len);
        let start = self.internal_key_offset(i);
        data[start..start + self.key_len].copy_from_slice(key);
    }

    /// Insert `key` at key index `i` with `right` as child `i + 1`.
    pub fn internal_insert(&self, data: &mut [u8], i: usize, key: &[u8], right: PageId) {
        let count = self.count(data);
        debug_assert!(i <= count && count < self.max);

        // Everything from key i through the last child moves one stride
        let start = self.internal_key_offset(i);
        let end = self.internal_end(count);
        data.copy_within(start..end, start + self.internal_stride());
        self.set_internal_key(data, i, key);
        self.set_child(data, i + 1, right);
        self.set_count(data, count + 1);
    }

    /// Remove key `i` and child `i + 1`.
    pub fn internal_remove(&self, data: &mut [u8], i: usize) {
        let count = self.count(data);
        debug_assert!(i < count);

        let start = self.internal_key_offset(i);
        let end = self.internal_end(count);
        data.copy_within(start + self.internal_stride()..end, start);
        self.set_count(data, count - 1);
    }

    /// Insert `child` as child 0 and `key` as key 0, shifting the rest.
    pub fn internal_push_front(&self, data: &mut [u8], child: PageId, key: &[u8]) {
        let count = self.count(data);
        debug_assert!(count < self.max);

        let start = self.child_offset(0);
        let end = self.internal_end(count);
        data.copy_within(start..end, start + self.internal_stride());
        self.set_child(data, 0, child);
        self.set_internal_key(data, 0, key);
        self.set_count(data, count + 1);
    }

    /// Remove child 0 and key 0.
    pub fn internal_pop_front(&self, data: &mut [u8]) {
        let count = self.count(data);
        debug_assert!(count > 0);

        let start = self.child_offset(0);
        let end = self.internal_end(count);
        data.copy_within(start + self.internal_stride()..end, start);
        self.set_count(data, count - 1);
    }

    // ========================================================================
    // Raw ranges
    // ========================================================================

    pub fn read_range<'d>(&self, data: &'d [u8], start: usize, len: usize) -> &'d [u8] {
        &data[start..start + len]
    }

    pub fn write_range(&self, data: &mut [u8], start: usize, bytes: &[u8]) {
        data[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

#[inline]
fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&data[offset..offset + 4]);
    u32::from_be_bytes(buf)
}

#[inline]
fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
}
