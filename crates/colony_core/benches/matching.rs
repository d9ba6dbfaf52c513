//! Matching benchmarks for colony_core.
//!
//! Run with: `cargo bench -p colony_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use colony_core::prelude::*;
use colony_test_utils::fixtures::{always_reachable, village};
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

/// Benchmarks one matching tick and the classification pass alone.
pub fn matching_benchmark(c: &mut Criterion) {
    c.bench_function("run_tick_village_16_carriers", |b| {
        b.iter_batched(
            || (village(16), LogisticsMatcher::default()),
            |(mut colony, mut matcher)| black_box(matcher.run_tick(&mut colony, &always_reachable)),
            BatchSize::SmallInput,
        );
    });

    let colony = village(16);
    let matcher = LogisticsMatcher::default();
    c.bench_function("classify_village", |b| {
        b.iter(|| black_box(matcher.classify(black_box(&colony))));
    });
}

criterion_group!(benches, matching_benchmark);
criterion_main!(benches);
