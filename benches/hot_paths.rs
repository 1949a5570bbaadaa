//! Hot path benchmarks.
//!
//! Run with: `cargo bench --bench hot_paths`
//!
//! Covers the per-update cost callers pay on every recorded value and the
//! per-flush cost of rendering a batch.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use graphite_emitter::aggregator::MetricStore;
use graphite_emitter::config::resolve_path;
use graphite_emitter::{Aggregator, MetricKind, MetricValue, SimulatedTransport};

/// Aggregator updates on an existing path (lock + resolve + accumulate)
fn bench_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    group.throughput(Throughput::Elements(1));

    let agg = Aggregator::new("beta.instance", Arc::new(SimulatedTransport::new()));
    agg.add_sum("requests", 1).unwrap();
    agg.add_average("latency", 1).unwrap();
    agg.set_active("up").unwrap();

    group.bench_function("add_sum", |b| {
        b.iter(|| agg.add_sum(black_box("requests"), black_box(3)))
    });
    group.bench_function("add_average", |b| {
        b.iter(|| agg.add_average(black_box("latency"), black_box(42)))
    });
    group.bench_function("set_active", |b| b.iter(|| agg.set_active(black_box("up"))));

    group.finish();
}

fn bench_resolve_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolve_path");

    group.bench_function("namespaced", |b| {
        b.iter(|| resolve_path(black_box("beta.instance"), black_box("requests")))
    });
    group.bench_function("bare", |b| {
        b.iter(|| resolve_path(black_box(""), black_box("requests")))
    });

    group.finish();
}

/// Rendering a whole batch into one buffer
fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");

    for size in [10, 100, 1000] {
        let mut store = MetricStore::new();
        for i in 0..size {
            let kind = match i % 3 {
                0 => MetricKind::Sum,
                1 => MetricKind::Average,
                _ => MetricKind::Active,
            };
            let value: MetricValue = if kind == MetricKind::Active {
                (i % 2 == 0).into()
            } else {
                (i as i64).into()
            };
            store
                .update(format!("beta.instance.metric_{i}"), kind, value)
                .unwrap();
        }

        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &store, |b, store| {
            b.iter(|| store.render(black_box(1_554_992_147)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_update, bench_resolve_path, bench_render);

criterion_main!(benches);
