// Full repair benchmarks

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use repomend::repair::{NoopSink, Repairer};
use std::hint::black_box;

mod common;

fn bench_repair(c: &mut Criterion) {
    let mut group = c.benchmark_group("repair");
    group.sample_size(10); // Fewer samples for slower benchmarks

    for damage_every in [50, 10, 2] {
        let store = common::generate_history(500, 10, 20, damage_every);
        group.bench_with_input(BenchmarkId::new("damage_every", damage_every), &store, |b, store| {
            b.iter_batched(
                || store.clone(),
                |mut store| {
                    let repairer = Repairer::quiet(common::bench_config());
                    black_box(repairer.repair(&mut store, &mut NoopSink).unwrap())
                },
                BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_preview(c: &mut Criterion) {
    let mut group = c.benchmark_group("preview");
    group.sample_size(10);

    let store = common::generate_history(500, 10, 20, 10);
    group.bench_function("500_commits", |b| {
        b.iter(|| {
            let repairer = Repairer::quiet(common::bench_config());
            black_box(repairer.preview(&store, &mut NoopSink).unwrap())
        });
    });
    group.finish();
}

criterion_group!(benches, bench_repair, bench_preview);
criterion_main!(benches);
