//! File and block identifier types.

use std::fmt;

use super::PageId;

/// Identifies a file registered with the buffer pool.
///
/// Handed out by [`BufferPool::create_file`](crate::buffer::BufferPool::create_file)
/// and [`BufferPool::open_file`](crate::buffer::BufferPool::open_file). Handles
/// are never reused within one pool, so a stale handle fails with
/// `Error::UnknownFile` instead of reaching another file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// Create a new FileId.
    #[inline]
    pub fn new(id: u32) -> Self {
        FileId(id)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "File({})", self.0)
    }
}

/// Identity of one block: which file, which zero-based block number.
///
/// At most one buffer frame is bound to a given `BlockId` at any time.
///
/// # Example
/// ```
/// use blocktree::{BlockId, FileId, PageId};
///
/// let block = BlockId::new(FileId::new(0), PageId::new(7));
/// assert_eq!(block.page, PageId::new(7));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId {
    pub file: FileId,
    pub page: PageId,
}

impl BlockId {
    /// Create a new BlockId.
    #[inline]
    pub fn new(file: FileId, page: PageId) -> Self {
        Self { file, page }
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_id_equality() {
        let a = BlockId::new(FileId::new(1), PageId::new(2));
        let b = BlockId::new(FileId::new(1), PageId::new(2));
        let c = BlockId::new(FileId::new(2), PageId::new(2));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_block_id_display() {
        let block = BlockId::new(FileId::new(3), PageId::new(9));
        assert_eq!(format!("{}", block), "File(3):Page(9)");
    }
}
