use criterion::{black_box, criterion_group, criterion_main, Criterion};
use easy_chapters::chapters::parse_ffmetadata;
use easy_chapters::ChapterStore;

fn populated_store(count: u64) -> ChapterStore {
    let mut store = ChapterStore::new();
    store.set_duration(count * 60_000);
    // Interleave offsets so most inserts land mid-list
    for i in 0..count {
        store.add((i * 7919 % count) * 60_000);
    }
    store
}

/// Benchmark ordered insertion
fn bench_add(c: &mut Criterion) {
    c.bench_function("add_500_chapters", |b| {
        b.iter(|| populated_store(black_box(500)))
    });
}

/// Benchmark moving a chapter across the list
fn bench_move(c: &mut Criterion) {
    let mut store = populated_store(500);
    let id = store.chapters()[0].id();
    let mut forward = true;

    c.bench_function("move_to_resort", |b| {
        b.iter(|| {
            let target = if forward { 30_000_000 } else { 0 };
            store.move_to(black_box(id), target);
            forward = !forward;
        })
    });
}

/// Benchmark FFMETADATA generation and parsing
fn bench_ffmetadata(c: &mut Criterion) {
    let store = populated_store(500);
    let document = store.to_ffmetadata();

    c.bench_function("serialize_500", |b| b.iter(|| black_box(&store).to_ffmetadata()));
    c.bench_function("parse_500", |b| b.iter(|| parse_ffmetadata(black_box(&document))));
}

criterion_group!(benches, bench_add, bench_move, bench_ffmetadata);
criterion_main!(benches);
