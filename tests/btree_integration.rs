//! Integration tests for the B+ tree over a file-backed buffer pool.

use blocktree::buffer::BufferPool;
use blocktree::common::{BlockId, FileId, PageId};
use blocktree::index::{float_key, int_key, BPlusTree, KeyKind, RecordLocator};
use blocktree::storage::page::PageType;
use tempfile::{tempdir, TempDir};

fn setup(pool_size: usize) -> (BufferPool, FileId, TempDir) {
    let dir = tempdir().unwrap();
    let pool = BufferPool::new(pool_size);
    let file = pool.create_file(dir.path().join("tree.index")).unwrap();
    (pool, file, dir)
}

fn loc(k: i32) -> RecordLocator {
    RecordLocator::new(k as u32, 100 + k as u32)
}

/// Deterministic permutation of `0..n` (multiplicative step coprime to n).
fn scrambled(n: i32) -> Vec<i32> {
    let step = 7919;
    (0..n).map(|i| (i64::from(i) * step % i64::from(n)) as i32).collect()
}

/// Inserting MAX + 1 ascending keys splits the root leaf exactly once.
#[test]
fn test_single_split_makes_internal_root() {
    let (pool, file, _dir) = setup(8);
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
    let max = tree.layout().max_entries() as i32;

    for k in 1..=max {
        tree.insert(&int_key(k), loc(k)).unwrap();
    }
    assert_eq!(tree.root_kind().unwrap(), PageType::BTreeLeaf);

    tree.insert(&int_key(max + 1), loc(max + 1)).unwrap();

    assert_eq!(tree.root_kind().unwrap(), PageType::BTreeInternal);
    assert_eq!(tree.root_key_count().unwrap(), 1);
    assert_eq!(tree.block_count(), 3);
    for k in 1..=max + 1 {
        assert_eq!(tree.search(&int_key(k)).unwrap(), Some(loc(k)));
    }

    let stats = tree.validate().unwrap();
    assert_eq!(stats.leaves, 2);
    assert_eq!(stats.internals, 1);
}

#[test]
fn test_delete_middle_of_three() {
    let (pool, file, _dir) = setup(8);
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();

    for k in [10, 20, 30] {
        tree.insert(&int_key(k), loc(k)).unwrap();
    }
    assert!(tree.delete(&int_key(20)).unwrap());

    assert_eq!(tree.search(&int_key(20)).unwrap(), None);
    assert_eq!(tree.search(&int_key(10)).unwrap(), Some(loc(10)));
    assert_eq!(tree.search(&int_key(30)).unwrap(), Some(loc(30)));

    let keys: Vec<Vec<u8>> = tree.iter().unwrap().map(|e| e.unwrap().0).collect();
    assert_eq!(keys, vec![int_key(10), int_key(30)]);
}

#[test]
fn test_reopen_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.index");
    let keys = scrambled(3000);

    let (root, block_count) = {
        let pool = BufferPool::new(16);
        let file = pool.create_file(&path).unwrap();
        let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
        for &k in &keys {
            tree.insert(&int_key(k), loc(k)).unwrap();
        }
        let state = (tree.root(), tree.block_count());
        pool.close_file(file).unwrap();
        state
    };

    let pool = BufferPool::new(16);
    let file = pool.open_file(&path).unwrap();
    let tree = BPlusTree::open(&pool, file, KeyKind::Int, root, block_count).unwrap();

    for &k in &keys {
        assert_eq!(tree.search(&int_key(k)).unwrap(), Some(loc(k)), "key {}", k);
    }
    assert_eq!(tree.validate().unwrap().entries, keys.len());
}

#[test]
fn test_delete_absent_key_leaves_file_unchanged() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tree.index");
    let pool = BufferPool::new(8);
    let file = pool.create_file(&path).unwrap();
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();

    for k in (0..2000).step_by(2) {
        tree.insert(&int_key(k), loc(k)).unwrap();
    }
    pool.flush_all_pages().unwrap();
    let before = std::fs::read(&path).unwrap();
    let written = pool.stats().snapshot().pages_written;

    for k in [-1, 1, 999, 5000] {
        assert!(!tree.delete(&int_key(k)).unwrap());
    }
    pool.flush_all_pages().unwrap();

    assert_eq!(pool.stats().snapshot().pages_written, written);
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_small_pool_forces_evictions() {
    let (pool, file, _dir) = setup(6);
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
    let keys = scrambled(20_000);

    for &k in &keys {
        tree.insert(&int_key(k), loc(k)).unwrap();
    }
    assert!(pool.stats().snapshot().evictions > 0);
    let stats = tree.validate().unwrap();
    assert_eq!(stats.entries, keys.len());
    assert!(stats.height >= 2);

    // Delete every other key, then check both halves
    for &k in keys.iter().filter(|&&k| k % 2 == 0) {
        assert!(tree.delete(&int_key(k)).unwrap());
    }
    tree.validate().unwrap();
    for &k in &keys {
        let expected = if k % 2 == 0 { None } else { Some(loc(k)) };
        assert_eq!(tree.search(&int_key(k)).unwrap(), expected);
    }

    // Nothing is left pinned
    assert_eq!(pool.pin_count(BlockId::new(file, tree.root())), Some(0));
}

#[test]
fn test_delete_everything_collapses_to_leaf_root() {
    let (pool, file, _dir) = setup(8);
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
    let keys = scrambled(5000);

    for &k in &keys {
        tree.insert(&int_key(k), loc(k)).unwrap();
    }
    let grown = tree.block_count();

    for &k in keys.iter().rev() {
        assert!(tree.delete(&int_key(k)).unwrap());
    }

    assert_eq!(tree.root_kind().unwrap(), PageType::BTreeLeaf);
    assert_eq!(tree.root_key_count().unwrap(), 0);
    assert_eq!(tree.validate().unwrap().height, 1);
    // Block numbers are never handed out twice
    assert_eq!(tree.block_count(), grown);

    tree.insert(&int_key(1), loc(1)).unwrap();
    assert_eq!(tree.search(&int_key(1)).unwrap(), Some(loc(1)));
}

#[test]
fn test_float_keys_order_numerically() {
    let (pool, file, _dir) = setup(8);
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Float).unwrap();

    let values = [3.5f32, -0.25, 1e6, -7.0, 0.0, 2.75, -1e-3];
    for (i, v) in values.iter().enumerate() {
        tree.insert(&float_key(*v), RecordLocator::new(i as u32, 0)).unwrap();
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let scanned: Vec<Vec<u8>> = tree.iter().unwrap().map(|e| e.unwrap().0).collect();
    assert_eq!(scanned, sorted.iter().map(|v| float_key(*v)).collect::<Vec<_>>());

    assert_eq!(
        tree.search(&float_key(-7.0)).unwrap(),
        Some(RecordLocator::new(3, 0))
    );
}

#[test]
fn test_char_keys_with_padding() {
    let (pool, file, _dir) = setup(8);
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Char(6)).unwrap();

    for (i, name) in ["bob", "alice", "al", "alicia", "b"].iter().enumerate() {
        tree.insert(name.as_bytes(), RecordLocator::new(i as u32, 0)).unwrap();
    }

    assert_eq!(tree.search(b"al").unwrap(), Some(RecordLocator::new(2, 0)));
    assert_eq!(tree.search(b"ali").unwrap(), None);

    // A shorter key sorts after every longer key it prefixes
    let order: Vec<u32> = tree.iter().unwrap().map(|e| e.unwrap().1.block).collect();
    assert_eq!(order, vec![1, 3, 2, 0, 4]);
}

#[test]
fn test_range_scan_after_deletes() {
    let (pool, file, _dir) = setup(8);
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();

    for k in 0..1500 {
        tree.insert(&int_key(k), loc(k)).unwrap();
    }
    for k in 400..1100 {
        tree.delete(&int_key(k)).unwrap();
    }

    let got: Vec<RecordLocator> = tree
        .range(int_key(350)..int_key(1150))
        .unwrap()
        .map(|e| e.unwrap().1)
        .collect();
    let expected: Vec<RecordLocator> = (350..400).chain(1100..1150).map(loc).collect();
    assert_eq!(got, expected);
}

#[test]
fn test_open_missing_root_fails() {
    let (pool, file, _dir) = setup(8);
    BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
    pool.flush_all_pages().unwrap();

    assert!(BPlusTree::open(&pool, file, KeyKind::Int, PageId::new(40), 1).is_err());
}
