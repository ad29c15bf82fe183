//! Error types for blocktree.

use thiserror::Error;

use crate::common::{BlockId, FileId};

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in blocktree.
///
/// Lookups that miss are not errors: `search` returns `Ok(None)` and
/// `delete` returns `Ok(false)`. Everything here aborts the operation that
/// raised it.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from disk operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested block does not exist on disk.
    #[error("{0} not found")]
    PageNotFound(BlockId),

    /// No frame can be reused: every frame is pinned, or every unpinned
    /// frame belongs to the protected file.
    ///
    /// The pool is undersized for the workload.
    #[error("no evictable frame available in buffer pool")]
    PoolExhausted,

    /// File handle was never registered with the buffer pool, or was
    /// already closed.
    #[error("unknown file handle {0}")]
    UnknownFile(FileId),

    /// Block identity handed to `new_page` is already cached or on disk.
    #[error("{0} already exists")]
    BlockExists(BlockId),

    /// Key has the wrong length or content for its column.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// Key column declaration cannot back a tree.
    #[error("invalid key column: {0}")]
    InvalidKeyColumn(String),

    /// Block contents do not form a valid node.
    #[error("corrupt node at {block}: {reason}")]
    CorruptNode {
        block: BlockId,
        reason: String,
    },

    /// Deletion left `block` short and its chosen sibling holds exactly the
    /// minimum, so neither merge nor redistribution applies.
    #[error("unsupported rebalance at {block}: sibling {sibling} holds exactly the minimum")]
    UnsupportedRebalance { block: BlockId, sibling: BlockId },
}

impl Error {
    /// Shorthand for [`Error::CorruptNode`].
    pub(crate) fn corrupt(block: BlockId, reason: impl Into<String>) -> Self {
        Error::CorruptNode {
            block,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::PageId;

    #[test]
    fn test_error_display() {
        let block = BlockId::new(FileId::new(1), PageId::new(42));
        let err = Error::PageNotFound(block);
        assert_eq!(format!("{}", err), "File(1):Page(42) not found");

        let err = Error::PoolExhausted;
        assert_eq!(format!("{}", err), "no evictable frame available in buffer pool");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();

        match err {
            Error::Io(_) => {} // Success
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_corrupt_shorthand() {
        let block = BlockId::new(FileId::new(0), PageId::new(3));
        let err = Error::corrupt(block, "bad tag");
        assert_eq!(format!("{}", err), "corrupt node at File(0):Page(3): bad tag");
    }
}
