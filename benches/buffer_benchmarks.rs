//! Benchmarks for piece-table buffer operations.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stred_buffer::{Side, Span, TextBuffer};
use stred_core::{PatternMatcher, RuleSet};

/// Generates a large text string for benchmarking.
fn generate_large_text(lines: usize) -> String {
    (0..lines)
        .map(|i| format!("Line {}: This is a sample line of text for benchmarking purposes.\n", i))
        .collect()
}

/// Benchmarks buffer creation.
fn bench_buffer_creation(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_creation");

    for size in [100, 1000, 10000, 100000].iter() {
        let text = generate_large_text(*size);

        group.bench_with_input(BenchmarkId::new("from_text", size), &text, |b, text| {
            b.iter(|| {
                let buffer = TextBuffer::from_text(black_box(text.as_str())).unwrap();
                black_box(buffer)
            })
        });
    }

    group.finish();
}

/// Benchmarks insertion at various positions.
fn bench_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("insertion");

    let base_text = generate_large_text(10000);

    group.bench_function("insert_at_start", |b| {
        b.iter_with_setup(
            || TextBuffer::from_text(base_text.as_str()).unwrap(),
            |mut buffer| {
                buffer.set_point(0);
                buffer.insert(black_box(b"inserted text"), Side::Before).unwrap();
                black_box(buffer)
            },
        )
    });

    group.bench_function("insert_at_middle", |b| {
        b.iter_with_setup(
            || TextBuffer::from_text(base_text.as_str()).unwrap(),
            |mut buffer| {
                let mid = buffer.size() / 2;
                buffer.set_point(mid);
                buffer.insert(black_box(b"inserted text"), Side::After).unwrap();
                black_box(buffer)
            },
        )
    });

    group.bench_function("insert_at_end", |b| {
        b.iter_with_setup(
            || TextBuffer::from_text(base_text.as_str()).unwrap(),
            |mut buffer| {
                let end = buffer.size();
                buffer.set_point(end);
                buffer.insert(black_box(b"inserted text"), Side::After).unwrap();
                black_box(buffer)
            },
        )
    });

    // the pathological case for a piece table: many scattered edits
    group.bench_function("insert_100_scattered", |b| {
        b.iter_with_setup(
            || TextBuffer::from_text(base_text.as_str()).unwrap(),
            |mut buffer| {
                for i in 0..100 {
                    let pos = (i * 9973) % buffer.size();
                    buffer.set_point(pos);
                    buffer.insert(black_box(b"x"), Side::After).unwrap();
                }
                black_box(buffer)
            },
        )
    });

    group.finish();
}

/// Benchmarks deletion operations.
fn bench_deletion(c: &mut Criterion) {
    let mut group = c.benchmark_group("deletion");

    let base_text = generate_large_text(10000);

    group.bench_function("delete_at_start", |b| {
        b.iter_with_setup(
            || TextBuffer::from_text(base_text.as_str()).unwrap(),
            |mut buffer| {
                buffer.set_point(Span::new(0, 100));
                buffer.delete().unwrap();
                black_box(buffer)
            },
        )
    });

    group.bench_function("delete_at_middle", |b| {
        b.iter_with_setup(
            || TextBuffer::from_text(base_text.as_str()).unwrap(),
            |mut buffer| {
                let mid = buffer.size() / 2;
                buffer.set_point(Span::new(mid, mid + 100));
                buffer.delete().unwrap();
                black_box(buffer)
            },
        )
    });

    group.finish();
}

/// Benchmarks reading the document back out of the pieces.
fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("read");

    let base_text = generate_large_text(10000);
    let mut fragmented = TextBuffer::from_text(base_text.as_str()).unwrap();
    for i in 0..500 {
        let pos = (i * 997) % fragmented.size();
        fragmented.set_point(pos);
        fragmented.insert(b"#", Side::After).unwrap();
    }

    group.bench_function("read_contiguous", |b| {
        let mut buffer = TextBuffer::from_text(base_text.as_str()).unwrap();
        b.iter(|| {
            let bytes = buffer.read(black_box(1000), Some(4096)).unwrap();
            black_box(bytes)
        })
    });

    group.bench_function("read_fragmented", |b| {
        b.iter(|| {
            let bytes = fragmented.read(black_box(1000), Some(4096)).unwrap();
            black_box(bytes)
        })
    });

    group.finish();
}

/// Benchmarks pattern search through a scanner.
fn bench_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("search");

    let text = generate_large_text(10000);
    let mut buffer = TextBuffer::from_text(text.as_str()).unwrap();
    let rules = RuleSet::new();

    group.bench_function("find_first", |b| {
        let matcher = PatternMatcher::new("purposes", &rules).unwrap();
        b.iter(|| {
            let mut scanner = buffer.scanner(0, None).unwrap();
            let found = scanner.search(black_box(&matcher)).unwrap();
            black_box(found)
        })
    });

    group.bench_function("find_all_lines", |b| {
        let matcher = PatternMatcher::new("[^\\n]*\\n", &rules).unwrap();
        b.iter(|| {
            let mut scanner = buffer.scanner(0, None).unwrap();
            let mut count = 0;
            while scanner.search(black_box(&matcher)).unwrap().is_some() {
                count += 1;
            }
            black_box(count)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_buffer_creation,
    bench_insertion,
    bench_deletion,
    bench_read,
    bench_search,
);

criterion_main!(benches);
