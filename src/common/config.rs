//! Configuration constants for blocktree.

/// Size of a block in bytes (4KB).
///
/// Every index file is a flat sequence of blocks of this size, and every
/// buffer frame caches exactly one of them. Node capacity (MAX/MIN entries)
/// is derived from this value and the key length.
///
/// # Memory Layout
/// With 4KB blocks and 32-bit PageIds:
/// - Max blocks per file: 2^32 - 1 (`u32::MAX` is the "no block" sentinel)
/// - Max file size: just under 16TB
pub const PAGE_SIZE: usize = 4096;

/// Frame count used by [`IndexManager`](crate::index::IndexManager) when the
/// caller does not pick one.
pub const DEFAULT_POOL_SIZE: usize = 64;

/// Pad byte appended to text keys shorter than their column.
///
/// Never valid inside a text key, and sorts after every byte that is.
pub const KEY_PAD: u8 = 0xFF;

/// Longest text key column supported.
pub const MAX_CHAR_KEY_LENGTH: usize = 255;

/// File extension of index files created by the index manager.
pub const INDEX_FILE_EXTENSION: &str = "index";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_pad_is_not_ascii() {
        assert!(!KEY_PAD.is_ascii());
    }
}
