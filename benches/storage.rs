//! # Storage Benchmarks
//!
//! Micro-benchmarks for the hot paths: slot allocation inside a page and
//! row inserts through the full table stack.
//!
//! ```bash
//! cargo bench --bench storage
//! cargo bench --bench storage -- allocator   # allocator only
//! cargo bench --bench storage -- insert      # table inserts only
//! ```

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use slotdb::storage::SlotAllocator;
use slotdb::{ColumnDescriptor, Database, Item, ItemType, TableDescriptor};
use tempfile::tempdir;

fn bench_allocator(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocator");

    group.bench_function("allocate_20b_until_full", |b| {
        b.iter_batched_ref(
            || vec![0u8; 4090],
            |buffer| {
                let mut alloc = SlotAllocator::new(buffer).unwrap();
                while let Ok((index, _)) = alloc.allocate(20) {
                    black_box(index);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("free_slot_reuse", |b| {
        b.iter_batched_ref(
            || {
                let mut buffer = vec![0u8; 4090];
                {
                    let mut alloc = SlotAllocator::new(&mut buffer).unwrap();
                    for _ in 0..64 {
                        alloc.allocate(20).unwrap();
                    }
                    for index in (0..64).step_by(2) {
                        alloc.deallocate(index).unwrap();
                    }
                }
                buffer
            },
            |buffer| {
                let mut alloc = SlotAllocator::new(buffer).unwrap();
                for _ in 0..32 {
                    let (index, _) = alloc.allocate(16).unwrap();
                    black_box(index);
                }
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    group.sample_size(20);

    group.bench_function("table_insert_1k_rows", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let db = Database::open(dir.path().join("bench.db")).unwrap();
                db.add_table(TableDescriptor::new(
                    "users",
                    vec![
                        ColumnDescriptor::new("id", ItemType::Integer),
                        ColumnDescriptor::new("name", ItemType::String),
                    ],
                ))
                .unwrap();
                (dir, db)
            },
            |(_dir, db)| {
                let users = db.table("users").unwrap();
                for i in 0..1000 {
                    users
                        .insert(&[Item::Integer(i), Item::from("benchmark-row")])
                        .unwrap();
                }
            },
            BatchSize::PerIteration,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_allocator, bench_insert);
criterion_main!(benches);
