//! RAII guards for page access.
//!
//! These guards provide safe access to blocks in the buffer pool:
//! - [`PageReadGuard`] - Shared read access
//! - [`PageWriteGuard`] - Exclusive write access; marks the frame dirty on
//!   drop if the bytes were borrowed mutably
//!
//! Both guards pin their frame for as long as they live and unpin it when
//! dropped. A pinned frame is never chosen for eviction.

use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{BlockId, FrameId};
use crate::storage::page::Page;

use super::buffer_pool::BufferPool;

/// Guard for read-only page access.
///
/// # Example
/// ```ignore
/// let guard = pool.fetch_page_read(block)?;
/// let tag = guard.page_type();  // Deref to &Page
/// // guard drops here, frame unpinned
/// ```
pub struct PageReadGuard<'a> {
    /// Reference back to the pool for unpin on drop.
    pool: &'a BufferPool,
    /// Frame holding this block.
    frame_id: FrameId,
    block: BlockId,
    lock: RwLockReadGuard<'a, Page>,
}

impl<'a> PageReadGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        frame_id: FrameId,
        block: BlockId,
        lock: RwLockReadGuard<'a, Page>,
    ) -> Self {
        Self {
            pool,
            frame_id,
            block,
            lock,
        }
    }

    /// Get the block identity.
    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page_internal(self.frame_id, false);
    }
}

/// Guard for exclusive write access to a page.
///
/// Reading through a write guard does not dirty the frame; only a mutable
/// borrow of the bytes does. A lookup that finds nothing to change therefore
/// leaves the block clean.
///
/// # Example
/// ```ignore
/// let mut guard = pool.fetch_page_write(block)?;
/// guard.as_mut_slice()[0] = 0xFF;  // DerefMut to &mut Page
/// // guard drops here, frame marked dirty and unpinned
/// ```
pub struct PageWriteGuard<'a> {
    pool: &'a BufferPool,
    frame_id: FrameId,
    block: BlockId,
    lock: RwLockWriteGuard<'a, Page>,
    /// Set once the bytes have been borrowed mutably.
    modified: bool,
}

impl<'a> PageWriteGuard<'a> {
    pub(crate) fn new(
        pool: &'a BufferPool,
        frame_id: FrameId,
        block: BlockId,
        lock: RwLockWriteGuard<'a, Page>,
    ) -> Self {
        Self {
            pool,
            frame_id,
            block,
            lock,
            modified: false,
        }
    }

    /// Get the block identity.
    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Get the frame ID.
    #[inline]
    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    /// Whether the bytes have been borrowed mutably through this guard.
    #[inline]
    pub fn is_modified(&self) -> bool {
        self.modified
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        self.modified = true;
        &mut self.lock
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin_page_internal(self.frame_id, self.modified);
    }
}
