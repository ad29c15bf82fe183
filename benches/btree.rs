//! B+ tree benchmarks.
//!
//! Run with: `cargo bench --bench btree`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use blocktree::buffer::BufferPool;
use blocktree::index::{int_key, BPlusTree, KeyKind, RecordLocator};
use tempfile::tempdir;

const KEYS: i32 = 10_000;

fn scrambled(n: i32) -> Vec<i32> {
    (0..n).map(|i| (i64::from(i) * 7919 % i64::from(n)) as i32).collect()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree_insert");
    let keys = scrambled(KEYS);

    for pool_size in [8usize, 64, 512] {
        group.bench_with_input(BenchmarkId::from_parameter(pool_size), &pool_size, |b, &size| {
            b.iter(|| {
                let dir = tempdir().unwrap();
                let pool = BufferPool::new(size);
                let file = pool.create_file(dir.path().join("bench.index")).unwrap();
                let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
                for &k in &keys {
                    tree.insert(&int_key(k), RecordLocator::new(k as u32, 0)).unwrap();
                }
            });
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let dir = tempdir().unwrap();
    let pool = BufferPool::new(64);
    let file = pool.create_file(dir.path().join("bench.index")).unwrap();
    let mut tree = BPlusTree::create(&pool, file, KeyKind::Int).unwrap();
    let keys = scrambled(KEYS);
    for &k in &keys {
        tree.insert(&int_key(k), RecordLocator::new(k as u32, 0)).unwrap();
    }

    c.bench_function("btree_search_hot", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let k = keys[i % keys.len()];
            i += 1;
            black_box(tree.search(&int_key(k)).unwrap())
        });
    });

    c.bench_function("btree_full_scan", |b| {
        b.iter(|| black_box(tree.iter().unwrap().count()));
    });
}

criterion_group!(benches, bench_insert, bench_search);
criterion_main!(benches);
