//! OMEN Criterion Benchmarks
//!
//! Hot paths of the enumerator: level-chain generation, sorted-index builds
//! and fixed-length candidate expansion.

#![allow(clippy::pedantic, clippy::nursery)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use omen::{Alphabet, Discipline, Enumerator, LevelChain, Model, RunOptions, SortedCp};

// =============================================================================
// BENCHMARK 1: LEVEL CHAINS
// =============================================================================

/// Raw composition-generation throughput for one (length, target) ticket.
fn bench_level_chains(c: &mut Criterion) {
    let mut group = c.benchmark_group("1-Level-Chains");

    for (length, target) in [(6usize, 12u32), (10, 20), (14, 28)] {
        group.bench_with_input(
            criterion::BenchmarkId::from_parameter(format!("len{length}-target{target}")),
            &(length, target),
            |b, &(length, target)| {
                b.iter(|| {
                    let mut chain = LevelChain::new(length, target, 11);
                    let mut produced = 0u64;
                    while chain.advance() {
                        produced += 1;
                    }
                    black_box(produced)
                });
            },
        );
    }
    group.finish();
}

// =============================================================================
// BENCHMARK 2: INDEX BUILD
// =============================================================================

/// Counting-sort build of the CP index, the per-boost-cycle rebuild cost.
fn bench_index_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("2-Index-Build");

    for sigma in [26usize, 72] {
        let prefix_count = sigma * sigma;
        let cp: Vec<u8> = (0..prefix_count * sigma)
            .map(|code| (code % 11) as u8)
            .collect();

        group.throughput(Throughput::Elements(cp.len() as u64));
        group.bench_with_input(
            criterion::BenchmarkId::from_parameter(format!("sigma{sigma}-n3")),
            &cp,
            |b, cp| {
                b.iter(|| black_box(SortedCp::build(cp, sigma, prefix_count, 11)));
            },
        );
    }
    group.finish();
}

// =============================================================================
// BENCHMARK 3: EXPANSION
// =============================================================================

/// End-to-end candidate emission on a uniform model.
fn bench_expansion(c: &mut Criterion) {
    let mut group = c.benchmark_group("3-Expansion");

    let alphabet = Alphabet::new(b"abcdefgh").unwrap();
    let sigma = alphabet.len();
    let model = Model::new(
        3,
        alphabet,
        11,
        vec![0; sigma * sigma],
        vec![0; sigma * sigma * sigma],
        vec![0; sigma * sigma],
        vec![0; 20],
    )
    .unwrap();

    for budget in [10_000u64, 100_000] {
        group.throughput(Throughput::Elements(budget));
        group.bench_with_input(
            criterion::BenchmarkId::from_parameter(format!("{budget}-candidates")),
            &budget,
            |b, &budget| {
                b.iter(|| {
                    let options = RunOptions {
                        discipline: Discipline::Fixed(8),
                        max_attempts: budget,
                        ..RunOptions::default()
                    };
                    let report = Enumerator::new(&model, options).unwrap().run().unwrap();
                    black_box(report.attempts)
                });
            },
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_level_chains,
    bench_index_build,
    bench_expansion
);
criterion_main!(benches);
