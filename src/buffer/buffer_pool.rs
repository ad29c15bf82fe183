//! Buffer Pool - the block caching layer every index access goes through.
//!
//! The [`BufferPool`] provides:
//! - Block caching between index files and memory, keyed by [`BlockId`]
//! - Pin-based reference counting through RAII guards
//! - LRU eviction with dirty write-back
//! - A registry of the files it caches blocks for

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::buffer::replacer::LruReplacer;
use crate::buffer::{BufferPoolStats, Frame, PageReadGuard, PageWriteGuard};
use crate::common::{BlockId, Error, FileId, FrameId, Result};
use crate::storage::DiskManager;

/// Which bound frames may be reclaimed when no free frame is left.
#[derive(Debug, Clone, Copy)]
enum VictimScope {
    /// Any unpinned frame.
    Any,
    /// Any unpinned frame not bound to this file.
    ExceptFile(FileId),
}

/// Manages a pool of buffer frames caching blocks of one or more files.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                         BufferPool                           │
/// │  ┌───────────────┐  ┌───────────────────────────────────┐    │
/// │  │ page_table    │  │        frames: Vec<Frame>         │    │
/// │  │BlockId → Fid  │─▶│  [Frame0] [Frame1] [Frame2] ...   │    │
/// │  └───────────────┘  └───────────────────────────────────┘    │
/// │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐    │
/// │  │  free_list   │  │   replacer   │  │      files       │    │
/// │  │ Vec<FrameId> │  │ LruReplacer  │  │FileId → DiskMgr  │    │
/// │  └──────────────┘  └──────────────┘  └──────────────────┘    │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Ownership
/// The pool is an explicit dependency: trees borrow it, nothing reaches it
/// through a global. It is driven by one thread at a time; the locks exist
/// so that one operation can hold guards on several frames at once through
/// `&self`. Fetching a block that the same thread already holds a write
/// guard on would block forever, so callers release a guard before
/// re-fetching its block.
///
/// # Usage
/// ```ignore
/// let pool = BufferPool::new(16);
/// let file = pool.create_file("orders_pk.index")?;
///
/// let mut guard = pool.new_page(BlockId::new(file, PageId::new(0)))?;
/// guard.as_mut_slice()[0] = 0xAB;
/// drop(guard);
///
/// let guard = pool.fetch_page_read(BlockId::new(file, PageId::new(0)))?;
/// ```
pub struct BufferPool {
    /// Fixed pool of frames allocated at startup.
    frames: Vec<Frame>,

    /// Maps bound blocks to their frames.
    page_table: RwLock<HashMap<BlockId, FrameId>>,

    /// Stack of unbound frame IDs, used before any eviction.
    free_list: Mutex<Vec<FrameId>>,

    /// Eviction policy for selecting victim frames.
    replacer: Mutex<LruReplacer>,

    /// Open files, one disk manager each.
    files: Mutex<HashMap<FileId, DiskManager>>,

    /// Next file handle to hand out.
    next_file_id: AtomicU32,

    /// Performance statistics.
    stats: BufferPoolStats,

    /// Number of frames in the pool (immutable after construction).
    pool_size: usize,
}

impl BufferPool {
    /// Create a new buffer pool.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();

        // All frames start on the free list (LIFO order)
        let free_list: Vec<FrameId> = (0..pool_size).map(FrameId::new).collect();

        Self {
            frames,
            page_table: RwLock::new(HashMap::new()),
            free_list: Mutex::new(free_list),
            replacer: Mutex::new(LruReplacer::new(pool_size)),
            files: Mutex::new(HashMap::new()),
            next_file_id: AtomicU32::new(0),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: File registry
    // ========================================================================

    /// Create a new, empty file and register it.
    ///
    /// # Errors
    /// Fails if the file already exists or cannot be created.
    pub fn create_file<P: AsRef<Path>>(&self, path: P) -> Result<FileId> {
        let file_id = self.next_file_handle();
        let dm = DiskManager::create(path, file_id)?;
        debug!(file = %file_id, path = %dm.path().display(), "created file");
        self.files.lock().insert(file_id, dm);
        Ok(file_id)
    }

    /// Open an existing file and register it.
    ///
    /// # Errors
    /// Fails if the file does not exist or cannot be opened.
    pub fn open_file<P: AsRef<Path>>(&self, path: P) -> Result<FileId> {
        let file_id = self.next_file_handle();
        let dm = DiskManager::open(path, file_id)?;
        debug!(file = %file_id, path = %dm.path().display(), blocks = dm.page_count(), "opened file");
        self.files.lock().insert(file_id, dm);
        Ok(file_id)
    }

    /// Write back the file's dirty blocks, release its frames, and forget
    /// the handle.
    pub fn close_file(&self, file: FileId) -> Result<()> {
        let blocks: Vec<(BlockId, FrameId)> = self.bound_frames(|b| b.file == file);
        for (block, frame_id) in blocks {
            self.flush_frame(frame_id, block)?;
        }
        self.invalidate_file(file);

        let mut dm = self.files.lock().remove(&file).ok_or(Error::UnknownFile(file))?;
        dm.sync()?;
        debug!(file = %file, "closed file");
        Ok(())
    }

    /// Release the file's frames without writing them back, forget the
    /// handle, and delete the file from disk.
    pub fn drop_file(&self, file: FileId) -> Result<()> {
        self.invalidate_file(file);
        let dm = self.files.lock().remove(&file).ok_or(Error::UnknownFile(file))?;
        debug!(file = %file, path = %dm.path().display(), "dropping file");
        dm.remove()
    }

    /// Number of blocks the file currently holds on disk.
    pub fn file_page_count(&self, file: FileId) -> Result<u32> {
        self.files
            .lock()
            .get(&file)
            .map(DiskManager::page_count)
            .ok_or(Error::UnknownFile(file))
    }

    /// One past the highest block of `file` bound to a frame, 0 if none.
    ///
    /// Blocks created by `new_page` live only here until written back, so
    /// the next free block number is the larger of this and
    /// [`BufferPool::file_page_count`].
    pub fn cached_page_end(&self, file: FileId) -> u32 {
        self.page_table
            .read()
            .keys()
            .filter(|block| block.file == file)
            .map(|block| block.page.0.saturating_add(1))
            .max()
            .unwrap_or(0)
    }

    // ========================================================================
    // Public API: Fetch blocks
    // ========================================================================

    /// Fetch a block for reading (shared access).
    ///
    /// If the block is already cached, returns immediately. Otherwise loads
    /// it from disk, possibly evicting another block.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the block doesn't exist on disk
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::UnknownFile` if the file handle is not registered
    pub fn fetch_page_read(&self, block: BlockId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.fetch_page_internal(block)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, block, lock))
    }

    /// Fetch a block for writing (exclusive access).
    ///
    /// Same as `fetch_page_read`, but returns an exclusive guard.
    pub fn fetch_page_write(&self, block: BlockId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.fetch_page_internal(block)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, block, lock))
    }

    // ========================================================================
    // Public API: Create blocks
    // ========================================================================

    /// Bind a zeroed frame to a new block identity without touching disk.
    ///
    /// The frame starts dirty, so the block reaches the file on its first
    /// write-back.
    ///
    /// # Errors
    /// - `Error::PoolExhausted` if every frame is pinned
    /// - `Error::UnknownFile` if the file handle is not registered
    /// - `Error::BlockExists` if the block is cached or already on disk
    pub fn new_page(&self, block: BlockId) -> Result<PageWriteGuard<'_>> {
        self.new_page_internal(block, VictimScope::Any)
    }

    /// Like [`BufferPool::new_page`], but never evicts a frame bound to
    /// `block.file`, so no block of the file being extended leaves the pool
    /// while it grows.
    ///
    /// Trees do not need this: every node a structural change touches is
    /// pinned by a live guard, so [`BufferPool::new_page`] cannot evict it.
    ///
    /// # Errors
    /// `Error::PoolExhausted` when every unpinned frame belongs to that file.
    pub fn new_page_protected(&self, block: BlockId) -> Result<PageWriteGuard<'_>> {
        self.new_page_internal(block, VictimScope::ExceptFile(block.file))
    }

    // ========================================================================
    // Public API: Flush and invalidate
    // ========================================================================

    /// Write a cached block to disk if it's dirty.
    ///
    /// Clean or uncached blocks are a no-op.
    pub fn flush_page(&self, block: BlockId) -> Result<()> {
        let frame_id = match self.page_table.read().get(&block) {
            Some(&fid) => fid,
            None => return Ok(()),
        };

        self.flush_frame(frame_id, block)
    }

    /// Flush every dirty block, then sync every open file.
    pub fn flush_all_pages(&self) -> Result<()> {
        for (block, frame_id) in self.bound_frames(|_| true) {
            self.flush_frame(frame_id, block)?;
        }

        for dm in self.files.lock().values_mut() {
            dm.sync()?;
        }

        Ok(())
    }

    /// Unbind every frame holding a block of `file`, discarding unwritten
    /// changes.
    ///
    /// Used when the file is about to be deleted. Frames go back to the
    /// free list.
    pub fn invalidate_file(&self, file: FileId) {
        let mut pt = self.page_table.write();
        let victims: Vec<(BlockId, FrameId)> = pt
            .iter()
            .filter(|(block, _)| block.file == file)
            .map(|(&block, &fid)| (block, fid))
            .collect();

        let mut replacer = self.replacer.lock();
        let mut fl = self.free_list.lock();
        for (block, frame_id) in &victims {
            pt.remove(block);
            let frame = &self.frames[frame_id.0];
            debug_assert!(!frame.is_pinned(), "invalidating pinned {}", block);
            frame.invalidate();
            replacer.remove(*frame_id);
            fl.push(*frame_id);
        }

        if !victims.is_empty() {
            debug!(file = %file, frames = victims.len(), "invalidated frames");
        }
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Get the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Get the number of unbound frames.
    pub fn free_frame_count(&self) -> usize {
        self.free_list.lock().len()
    }

    /// Get the number of cached blocks.
    pub fn page_count(&self) -> usize {
        self.page_table.read().len()
    }

    /// Whether the block is bound to a frame.
    pub fn is_cached(&self, block: BlockId) -> bool {
        self.page_table.read().contains_key(&block)
    }

    /// Dirty flag of a cached block, `None` if not cached.
    pub fn is_dirty(&self, block: BlockId) -> Option<bool> {
        self.frame_of(block).map(|fid| self.frames[fid.0].is_dirty())
    }

    /// Pin count of a cached block, `None` if not cached.
    pub fn pin_count(&self, block: BlockId) -> Option<u32> {
        self.frame_of(block).map(|fid| self.frames[fid.0].pin_count())
    }

    // ========================================================================
    // Internal: Called by page guards on drop
    // ========================================================================

    /// Unpin a frame. Called by PageReadGuard/PageWriteGuard on drop.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];

        if is_dirty {
            frame.mark_dirty();
        }

        // A frame invalidated while pinned stays off the replacer; it is
        // already on the free list.
        if frame.unpin() == 0 && frame.block().is_some() {
            self.replacer.lock().set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    fn fetch_page_internal(&self, block: BlockId) -> Result<FrameId> {
        if let Some(frame_id) = self.frame_of(block) {
            self.pin_and_touch(frame_id);
            BufferPoolStats::bump(&self.stats.cache_hits);
            return Ok(frame_id);
        }

        self.handle_cache_miss(block)
    }

    /// Load a block into a frame.
    ///
    /// A failed read leaves the frame unbound and back on the free list.
    fn handle_cache_miss(&self, block: BlockId) -> Result<FrameId> {
        BufferPoolStats::bump(&self.stats.cache_misses);
        self.ensure_file(block.file)?;

        let frame_id = self.get_free_frame(VictimScope::Any)?;

        let read = {
            let mut files = self.files.lock();
            match files.get_mut(&block.file) {
                Some(dm) => dm.read_page(block.page),
                None => Err(Error::UnknownFile(block.file)),
            }
        };
        let page_data = match read {
            Ok(page) => page,
            Err(e) => {
                self.free_list.lock().push(frame_id);
                return Err(e);
            }
        };
        BufferPoolStats::bump(&self.stats.pages_read);

        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        frame.set_block(Some(block));
        self.page_table.write().insert(block, frame_id);
        self.pin_and_touch(frame_id);

        Ok(frame_id)
    }

    fn new_page_internal(&self, block: BlockId, scope: VictimScope) -> Result<PageWriteGuard<'_>> {
        if self.frame_of(block).is_some() || block.page.0 < self.file_page_count(block.file)? {
            return Err(Error::BlockExists(block));
        }

        let frame_id = self.get_free_frame(scope)?;
        self.frames[frame_id.0].set_block(Some(block));
        self.page_table.write().insert(block, frame_id);

        self.pin_and_touch(frame_id);
        BufferPoolStats::bump(&self.stats.pages_allocated);

        let frame = &self.frames[frame_id.0];
        frame.mark_dirty();
        let mut lock = frame.page_mut();
        lock.reset();

        Ok(PageWriteGuard::new(self, frame_id, block, lock))
    }

    /// Pin a bound frame and record the access with the replacer.
    fn pin_and_touch(&self, frame_id: FrameId) {
        self.frames[frame_id.0].pin();

        let mut replacer = self.replacer.lock();
        replacer.record_access(frame_id);
        replacer.set_evictable(frame_id, false);
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Get an unbound frame, evicting if necessary.
    fn get_free_frame(&self, scope: VictimScope) -> Result<FrameId> {
        if let Some(frame_id) = self.free_list.lock().pop() {
            return Ok(frame_id);
        }

        self.evict_page(scope)
    }

    /// Evict the least recently used eligible block and return its frame.
    fn evict_page(&self, scope: VictimScope) -> Result<FrameId> {
        let frame_id = {
            let mut replacer = self.replacer.lock();
            replacer
                .evict_where(|fid| match scope {
                    VictimScope::Any => true,
                    VictimScope::ExceptFile(file) => self.frames[fid.0]
                        .block()
                        .map_or(true, |block| block.file != file),
                })
                .ok_or(Error::PoolExhausted)?
        };

        let frame = &self.frames[frame_id.0];
        let old_block = frame.block();

        if let Some(block) = old_block {
            // Write back before the identity changes; on failure the frame
            // keeps its block and stays a candidate.
            if let Err(e) = self.flush_frame(frame_id, block) {
                self.replacer.lock().set_evictable(frame_id, true);
                return Err(e);
            }
            self.page_table.write().remove(&block);
            debug!(block = %block, frame = %frame_id, "evicted block");
        }

        frame.invalidate();
        BufferPoolStats::bump(&self.stats.evictions);

        Ok(frame_id)
    }

    /// Flush a frame to disk if dirty.
    fn flush_frame(&self, frame_id: FrameId, block: BlockId) -> Result<()> {
        let frame = &self.frames[frame_id.0];

        if frame.is_dirty() {
            let page = frame.page();
            {
                let mut files = self.files.lock();
                let dm = files
                    .get_mut(&block.file)
                    .ok_or(Error::UnknownFile(block.file))?;
                dm.write_page(block.page, &page)?;
            }
            drop(page);

            frame.clear_dirty();
            BufferPoolStats::bump(&self.stats.pages_written);
        }

        Ok(())
    }

    // ========================================================================
    // Internal: helpers
    // ========================================================================

    fn frame_of(&self, block: BlockId) -> Option<FrameId> {
        self.page_table.read().get(&block).copied()
    }

    fn bound_frames<F>(&self, filter: F) -> Vec<(BlockId, FrameId)>
    where
        F: Fn(&BlockId) -> bool,
    {
        self.page_table
            .read()
            .iter()
            .filter(|(block, _)| filter(block))
            .map(|(&block, &fid)| (block, fid))
            .collect()
    }

    fn ensure_file(&self, file: FileId) -> Result<()> {
        if self.files.lock().contains_key(&file) {
            Ok(())
        } else {
            Err(Error::UnknownFile(file))
        }
    }

    fn next_file_handle(&self) -> FileId {
        FileId::new(self.next_file_id.fetch_add(1, Ordering::Relaxed))
    }
}
