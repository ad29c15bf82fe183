//! Disk Manager - low-level file I/O for index blocks.
//!
//! The [`DiskManager`] handles all direct file operations for one file:
//! - Reading and writing blocks
//! - Tracking how many blocks the file holds
//! - Syncing and deleting the file

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::common::config::PAGE_SIZE;
use crate::common::{BlockId, Error, FileId, PageId, Result};
use crate::storage::page::Page;

/// Manages disk I/O for a single index file.
///
/// # File Layout
/// The file is a flat sequence of blocks:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Block 0 │ Block 1 │ Block 2 │  ...    │ Block N │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// Blocks are created in memory by the buffer pool and reach the file the
/// first time they are written back, so writing block `N` past the current
/// end extends the file.
///
/// # Thread Safety
/// `DiskManager` is **single-threaded**. The `BufferPool` serializes access.
///
/// # Durability
/// Writes are not synced individually; [`DiskManager::sync`] is called when
/// the pool flushes everything.
pub struct DiskManager {
    file: File,
    path: PathBuf,
    /// Handle the buffer pool knows this file by.
    file_id: FileId,
    /// Number of blocks in the file.
    page_count: u32,
}

impl DiskManager {
    /// Create a new, empty file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, file_id: FileId) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path.as_ref())?;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            file_id,
            page_count: 0,
        })
    }

    /// Open an existing file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P, file_id: FileId) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path.as_ref())?;

        // Calculate block count from file size
        let file_size = file.metadata()?.len();
        let page_count = (file_size / PAGE_SIZE as u64) as u32;

        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
            file_id,
            page_count,
        })
    }

    /// Read a block from disk.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the block lies past the end of file.
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        if !page_id.is_valid() || page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(self.block(page_id)));
        }

        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;

        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;
        trace!(block = %self.block(page_id), "read block");

        Ok(page)
    }

    /// Write a block to disk, extending the file if needed.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` for the sentinel block number.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::PageNotFound(self.block(page_id)));
        }

        self.file.seek(SeekFrom::Start(page_id.file_offset(PAGE_SIZE)))?;
        self.file.write_all(page.as_slice())?;
        self.page_count = self.page_count.max(page_id.0 + 1);
        trace!(block = %self.block(page_id), "wrote block");

        Ok(())
    }

    /// Flush OS buffers for this file to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Close the handle and delete the file from disk.
    pub fn remove(self) -> Result<()> {
        let path = self.path;
        drop(self.file);
        fs::remove_file(path)?;
        Ok(())
    }

    /// Get the number of blocks in the file.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Get the total size of the file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Path the file was opened from.
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[inline]
    fn block(&self, page_id: PageId) -> BlockId {
        BlockId::new(self.file_id, page_id)
    }
}
