//! Index Manager - name-level access to B+ tree indexes.
//!
//! One index is one file, `<dir>/<index_name>.index`, holding one tree.
//! The manager owns the buffer pool shared by every index; the catalog
//! owns each index's [`IndexInfo`], which the manager updates in place as
//! roots move and blocks are allocated.

use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::buffer::BufferPool;
use crate::common::config::{DEFAULT_POOL_SIZE, INDEX_FILE_EXTENSION};
use crate::common::{Error, FileId, PageId, Result};
use crate::index::btree::BPlusTree;
use crate::index::key::{KeyKind, RecordLocator};

/// Catalog entry of one index: what the catalog persists and hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub index_name: String,
    pub table_name: String,
    pub key_kind: KeyKind,
    /// Blocks allocated in the index file so far.
    pub block_count: u32,
    /// Current root block.
    pub root: PageId,
}

impl IndexInfo {
    /// Describe a not-yet-built index.
    pub fn new(index_name: impl Into<String>, table_name: impl Into<String>, key_kind: KeyKind) -> Self {
        Self {
            index_name: index_name.into(),
            table_name: table_name.into(),
            key_kind,
            block_count: 0,
            root: PageId::new(0),
        }
    }

    /// Length of the indexed column in bytes.
    #[inline]
    pub fn column_length(&self) -> usize {
        self.key_kind.key_len()
    }
}

/// One row produced by the table's storage while building an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// The whole encoded row.
    pub bytes: Vec<u8>,
    /// Table block holding the row.
    pub block: u32,
    /// Byte offset of the row within that block.
    pub offset: u32,
}

impl StoredRow {
    #[inline]
    pub fn locator(&self) -> RecordLocator {
        RecordLocator::new(self.block, self.offset)
    }
}

/// Creates, opens, and drops index files and runs tree operations on them.
///
/// # Example
/// ```no_run
/// use blocktree::index::{int_key, IndexInfo, IndexManager, KeyKind, RecordLocator};
///
/// let mut manager = IndexManager::new("/var/lib/db", 64)?;
/// let mut info = IndexInfo::new("orders_pk", "orders", KeyKind::Int);
/// manager.create_index(&mut info, 0..4, std::iter::empty())?;
///
/// manager.insert_key(&mut info, &int_key(7), RecordLocator::new(0, 32))?;
/// assert!(manager.search_equal(&info, &int_key(7))?.is_some());
/// manager.flush()?;
/// # Ok::<(), blocktree::Error>(())
/// ```
pub struct IndexManager {
    dir: PathBuf,
    pool: BufferPool,
    /// Index files opened through this manager, by index name.
    files: HashMap<String, FileId>,
}

impl IndexManager {
    /// Manage index files under `dir` through a pool of `pool_size` frames.
    pub fn new<P: AsRef<Path>>(dir: P, pool_size: usize) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), pool_size, "index manager started");

        Ok(Self {
            dir,
            pool: BufferPool::new(pool_size),
            files: HashMap::new(),
        })
    }

    /// Same as [`IndexManager::new`] with `DEFAULT_POOL_SIZE` frames.
    pub fn with_default_pool<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Self::new(dir, DEFAULT_POOL_SIZE)
    }

    /// The pool every index goes through.
    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Path of the file backing `index_name`.
    pub fn index_path(&self, index_name: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", index_name, INDEX_FILE_EXTENSION))
    }

    /// Create the index file and populate it from the table's rows.
    ///
    /// `column` selects the key bytes within each row; its length must
    /// match the key kind. On success `info` holds the new root and block
    /// count. On failure the file is deleted again and `info` is left as
    /// it was, so the call can be retried.
    ///
    /// # Errors
    /// - `Error::InvalidKeyColumn` if `column` does not fit the key kind or
    ///   a row is shorter than `column.end`
    /// - `Error::MalformedKey` if a row's key is not valid for the kind
    /// - `Error::Io` if the file already exists
    pub fn create_index<I>(&mut self, info: &mut IndexInfo, column: Range<usize>, rows: I) -> Result<()>
    where
        I: IntoIterator<Item = StoredRow>,
    {
        if column.len() != info.column_length() {
            return Err(Error::InvalidKeyColumn(format!(
                "column {:?} is {} bytes, {} keys are {}",
                column,
                column.len(),
                info.key_kind,
                info.column_length()
            )));
        }

        let file = self.pool.create_file(self.index_path(&info.index_name))?;
        match self.bulk_load(info, file, column, rows) {
            Ok(built) => {
                self.files.insert(info.index_name.clone(), file);
                info!(index = %info.index_name, table = %info.table_name, rows = built, "built index");
                Ok(())
            }
            Err(e) => {
                warn!(index = %info.index_name, error = %e, "index build failed, removing file");
                self.pool.drop_file(file)?;
                Err(e)
            }
        }
    }

    /// Build a fresh tree in `file` from `rows`, saving its state into
    /// `info` only once every row is in.
    fn bulk_load<I>(&self, info: &mut IndexInfo, file: FileId, column: Range<usize>, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = StoredRow>,
    {
        let mut tree = BPlusTree::create(&self.pool, file, info.key_kind)?;
        let mut built = 0usize;
        for row in rows {
            let key = row.bytes.get(column.clone()).ok_or_else(|| {
                Error::InvalidKeyColumn(format!(
                    "row of {} bytes has no column {:?}",
                    row.bytes.len(),
                    column
                ))
            })?;
            tree.insert(key, row.locator())?;
            built += 1;
        }
        save_state(info, &tree);
        Ok(built)
    }

    /// Store `locator` under `key`, replacing any previous locator.
    pub fn insert_key(&mut self, info: &mut IndexInfo, key: &[u8], locator: RecordLocator) -> Result<()> {
        let file = self.file_for(&info.index_name)?;
        let mut tree = self.open_tree(info, file)?;
        let result = tree.insert(key, locator);
        save_state(info, &tree);
        result
    }

    /// Locator stored under `key`, if any.
    pub fn search_equal(&mut self, info: &IndexInfo, key: &[u8]) -> Result<Option<RecordLocator>> {
        let file = self.file_for(&info.index_name)?;
        self.open_tree(info, file)?.search(key)
    }

    /// Remove `key`. Returns whether it was present.
    pub fn delete_key(&mut self, info: &mut IndexInfo, key: &[u8]) -> Result<bool> {
        let file = self.file_for(&info.index_name)?;
        let mut tree = self.open_tree(info, file)?;
        let result = tree.delete(key);
        save_state(info, &tree);
        result
    }

    /// Every locator in key order.
    pub fn scan_index(&mut self, info: &IndexInfo) -> Result<Vec<RecordLocator>> {
        let file = self.file_for(&info.index_name)?;
        let tree = self.open_tree(info, file)?;
        tree.iter()?
            .map(|entry| entry.map(|(_, locator)| locator))
            .collect()
    }

    /// Discard the index's cached blocks and delete its file.
    pub fn drop_index(&mut self, info: &IndexInfo) -> Result<()> {
        let file = self.file_for(&info.index_name)?;
        self.files.remove(&info.index_name);
        self.pool.drop_file(file)?;

        info!(index = %info.index_name, "dropped index");
        Ok(())
    }

    /// Write back every dirty block of every index.
    pub fn flush(&self) -> Result<()> {
        debug!(indexes = self.files.len(), "flushing indexes");
        self.pool.flush_all_pages()
    }

    fn file_for(&mut self, index_name: &str) -> Result<FileId> {
        if let Some(&file) = self.files.get(index_name) {
            return Ok(file);
        }

        let file = self.pool.open_file(self.index_path(index_name))?;
        self.files.insert(index_name.to_string(), file);
        Ok(file)
    }

    fn open_tree(&self, info: &IndexInfo, file: FileId) -> Result<BPlusTree<'_>> {
        BPlusTree::open(&self.pool, file, info.key_kind, info.root, info.block_count)
    }
}

fn save_state(info: &mut IndexInfo, tree: &BPlusTree<'_>) {
    info.root = tree.root();
    info.block_count = tree.block_count();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::key::{float_key, int_key};
    use tempfile::tempdir;

    fn row(id: i32, name: &[u8], block: u32, offset: u32) -> StoredRow {
        let mut bytes = int_key(id);
        bytes.extend_from_slice(name);
        StoredRow { bytes, block, offset }
    }

    #[test]
    fn test_create_index_from_rows() {
        let dir = tempdir().unwrap();
        let mut manager = IndexManager::new(dir.path(), 16).unwrap();
        let mut info = IndexInfo::new("people_id", "people", KeyKind::Int);

        let rows = vec![row(3, b"carol", 0, 0), row(1, b"alice", 0, 13), row(2, b"bob", 1, 0)];
        manager.create_index(&mut info, 0..4, rows).unwrap();

        assert!(manager.index_path("people_id").exists());
        assert_eq!(
            manager.search_equal(&info, &int_key(1)).unwrap(),
            Some(RecordLocator::new(0, 13))
        );
        assert_eq!(
            manager.scan_index(&info).unwrap(),
            vec![
                RecordLocator::new(0, 13),
                RecordLocator::new(1, 0),
                RecordLocator::new(0, 0)
            ]
        );
    }

    #[test]
    fn test_create_index_rejects_wrong_column() {
        let dir = tempdir().unwrap();
        let mut manager = IndexManager::new(dir.path(), 16).unwrap();
        let mut info = IndexInfo::new("people_id", "people", KeyKind::Int);

        let result = manager.create_index(&mut info, 0..8, std::iter::empty());
        assert!(matches!(result, Err(Error::InvalidKeyColumn(_))));
        assert!(!manager.index_path("people_id").exists());

        let short = vec![StoredRow { bytes: vec![1, 2], block: 0, offset: 0 }];
        let result = manager.create_index(&mut info, 0..4, short);
        assert!(matches!(result, Err(Error::InvalidKeyColumn(_))));
    }

    #[test]
    fn test_failed_build_can_be_retried() {
        let dir = tempdir().unwrap();
        let mut manager = IndexManager::new(dir.path(), 8).unwrap();
        let mut info = IndexInfo::new("prices", "items", KeyKind::Float);

        let float_row = |v: f32, block: u32| StoredRow {
            bytes: float_key(v),
            block,
            offset: 0,
        };
        let result = manager.create_index(&mut info, 0..4, vec![float_row(1.0, 0), float_row(f32::NAN, 1)]);
        assert!(matches!(result, Err(Error::MalformedKey(_))));
        assert!(!manager.index_path("prices").exists());
        assert_eq!(manager.pool().page_count(), 0);
        assert_eq!(info.block_count, 0);

        manager.create_index(&mut info, 0..4, vec![float_row(1.0, 0)]).unwrap();
        assert_eq!(info.block_count, 1);

        // Enough inserts to split the root leaf
        for k in 0..400 {
            manager
                .insert_key(&mut info, &float_key(k as f32 + 0.5), RecordLocator::new(k, 1))
                .unwrap();
        }
        assert!(info.block_count >= 3);
        assert_eq!(manager.scan_index(&info).unwrap().len(), 401);
        assert_eq!(
            manager.search_equal(&info, &float_key(1.0)).unwrap(),
            Some(RecordLocator::new(0, 0))
        );
    }

    #[test]
    fn test_insert_delete_updates_info() {
        let dir = tempdir().unwrap();
        let mut manager = IndexManager::new(dir.path(), 16).unwrap();
        let mut info = IndexInfo::new("t_pk", "t", KeyKind::Int);
        manager.create_index(&mut info, 0..4, std::iter::empty()).unwrap();
        assert_eq!(info.block_count, 1);

        for k in 0..1000 {
            manager
                .insert_key(&mut info, &int_key(k), RecordLocator::new(k as u32, 0))
                .unwrap();
        }
        assert_ne!(info.root, PageId::new(0));
        assert!(info.block_count > 1);

        assert!(manager.delete_key(&mut info, &int_key(500)).unwrap());
        assert!(!manager.delete_key(&mut info, &int_key(500)).unwrap());
        assert_eq!(manager.search_equal(&info, &int_key(500)).unwrap(), None);
    }

    #[test]
    fn test_reopen_through_new_manager() {
        let dir = tempdir().unwrap();
        let mut info = IndexInfo::new("names", "people", KeyKind::Char(8));

        {
            let mut manager = IndexManager::new(dir.path(), 8).unwrap();
            manager.create_index(&mut info, 0..8, std::iter::empty()).unwrap();
            for (i, name) in ["mallory", "alice", "trent"].iter().enumerate() {
                manager
                    .insert_key(&mut info, name.as_bytes(), RecordLocator::new(i as u32, 0))
                    .unwrap();
            }
            manager.flush().unwrap();
        }

        let mut manager = IndexManager::new(dir.path(), 8).unwrap();
        assert_eq!(
            manager.search_equal(&info, b"trent").unwrap(),
            Some(RecordLocator::new(2, 0))
        );
        assert_eq!(manager.scan_index(&info).unwrap().len(), 3);
    }

    #[test]
    fn test_drop_index_removes_file() {
        let dir = tempdir().unwrap();
        let mut manager = IndexManager::with_default_pool(dir.path()).unwrap();
        let mut info = IndexInfo::new("gone", "t", KeyKind::Float);
        manager.create_index(&mut info, 0..4, std::iter::empty()).unwrap();

        manager.drop_index(&info).unwrap();

        assert!(!manager.index_path("gone").exists());
        assert_eq!(manager.pool().page_count(), 0);
    }
}
