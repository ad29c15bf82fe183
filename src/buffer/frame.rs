//! Frame - a slot in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus metadata needed for buffer management:
//! - Which block is loaded (if any); `None` means the frame is invalid
//! - Pin count for reference counting
//! - Dirty flag for write-back tracking
//!
//! The LRU age lives in the replacer, indexed by frame.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::BlockId;
use crate::storage::page::Page;

/// A frame in the buffer pool.
///
/// # Thread Safety
/// All fields use interior mutability so the pool can hand out guards on
/// several frames at once through `&self`:
/// - `page`: `RwLock` for read/write access to the bytes
/// - `block`: `Mutex` for the bound block tag
/// - `pin_count`: `AtomicU32`
/// - `is_dirty`: `AtomicBool`
pub struct Frame {
    /// The block bytes, protected by RwLock.
    page: RwLock<Page>,

    /// Which block is currently loaded, or None if the frame is invalid.
    block: Mutex<Option<BlockId>>,

    /// Number of live guards on this frame.
    pin_count: AtomicU32,

    /// Whether the bytes differ from what is on disk.
    is_dirty: AtomicBool,
}

impl Frame {
    /// Create a new empty frame.
    pub fn new() -> Self {
        Self {
            page: RwLock::new(Page::new()),
            block: Mutex::new(None),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Page access (RwLock)
    // ========================================================================

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    // ========================================================================
    // Block tag
    // ========================================================================

    /// Get the block bound to this frame.
    #[inline]
    pub fn block(&self) -> Option<BlockId> {
        *self.block.lock()
    }

    /// Bind or unbind the frame.
    #[inline]
    pub fn set_block(&self, block: Option<BlockId>) {
        *self.block.lock() = block;
    }

    // ========================================================================
    // Pin count operations (Atomic)
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::Relaxed);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    /// Get the current pin count.
    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Relaxed)
    }

    /// Check if the frame is currently pinned.
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty flag operations (Atomic)
    // ========================================================================

    /// Mark the frame as dirty (modified).
    #[inline]
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Relaxed);
    }

    /// Clear the dirty flag.
    #[inline]
    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Relaxed);
    }

    /// Check if the frame is dirty.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Relaxed)
    }

    // ========================================================================
    // Frame state queries
    // ========================================================================

    /// Check if the frame holds no block.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.block().is_none()
    }

    /// Check if the frame can be evicted.
    #[inline]
    pub fn is_evictable(&self) -> bool {
        self.block().is_some() && !self.is_pinned()
    }

    /// Unbind the frame and drop any unwritten changes.
    ///
    /// The bytes are left in place; they are zeroed or overwritten when the
    /// frame is bound again.
    pub fn invalidate(&self) {
        self.set_block(None);
        self.clear_dirty();
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{FileId, PageId};

    fn block(n: u32) -> BlockId {
        BlockId::new(FileId::new(0), PageId::new(n))
    }

    #[test]
    fn test_frame_new() {
        let frame = Frame::new();
        assert!(frame.is_empty());
        assert!(!frame.is_pinned());
        assert!(!frame.is_dirty());
        assert_eq!(frame.block(), None);
    }

    #[test]
    fn test_frame_pin_unpin() {
        let frame = Frame::new();

        assert_eq!(frame.pin(), 1);
        assert_eq!(frame.pin(), 2);
        assert_eq!(frame.unpin(), 1);
        assert!(frame.is_pinned());
        assert_eq!(frame.unpin(), 0);
        assert!(!frame.is_pinned());
    }

    #[test]
    #[should_panic(expected = "pin count underflow")]
    fn test_frame_unpin_underflow() {
        let frame = Frame::new();
        frame.unpin();
    }

    #[test]
    fn test_frame_page_access() {
        let frame = Frame::new();

        frame.page_mut().as_mut_slice()[0] = 0xAB;
        assert_eq!(frame.page().as_slice()[0], 0xAB);
    }

    #[test]
    fn test_frame_evictable() {
        let frame = Frame::new();

        // Empty frame is not evictable
        assert!(!frame.is_evictable());

        frame.set_block(Some(block(1)));
        assert!(frame.is_evictable());

        frame.pin();
        assert!(!frame.is_evictable());

        frame.unpin();
        assert!(frame.is_evictable());
    }

    #[test]
    fn test_frame_invalidate() {
        let frame = Frame::new();

        frame.set_block(Some(block(99)));
        frame.mark_dirty();

        frame.invalidate();

        assert!(frame.is_empty());
        assert!(!frame.is_dirty());
    }
}
