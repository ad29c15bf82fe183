//! Page type tag.
//!
//! Byte 0 of every index block says how the rest of the block is laid out.

/// Type of block stored on disk.
///
/// Uses `#[repr(u8)]` to guarantee a 1-byte representation for serialization.
#[repr(u8)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Uninitialized or corrupted block.
    #[default]
    Invalid = 0,
    /// B+ tree internal (non-leaf) node.
    BTreeInternal = 2,
    /// B+ tree leaf node.
    BTreeLeaf = 3,
    /// Block vacated by a merge or root collapse; no longer reachable.
    Free = 4,
}

impl PageType {
    /// Offset of the tag byte within a block.
    pub const OFFSET: usize = 0;

    /// Convert from u8, returning Invalid for unknown values.
    pub fn from_u8(value: u8) -> Self {
        match value {
            2 => PageType::BTreeInternal,
            3 => PageType::BTreeLeaf,
            4 => PageType::Free,
            _ => PageType::Invalid,
        }
    }

    /// Read the tag of a raw block.
    #[inline]
    pub fn of(data: &[u8]) -> Self {
        Self::from_u8(data[Self::OFFSET])
    }

    /// Stamp this tag onto a raw block.
    #[inline]
    pub fn write_to(self, data: &mut [u8]) {
        data[Self::OFFSET] = self as u8;
    }

    /// True for the two node kinds.
    #[inline]
    pub fn is_node(self) -> bool {
        matches!(self, PageType::BTreeInternal | PageType::BTreeLeaf)
    }
}
