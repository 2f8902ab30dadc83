use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use sitewatch_engine::sitewatch_types::{RawRecord, ScanOutcome};
use sitewatch_engine::{detect, detect_notable, transform, IdempotencyTracker, NotablePolicy, TransformConfig};

fn occupancy_records(count: usize, shift: usize) -> Vec<RawRecord> {
    (0..count)
        .map(|i| RawRecord::occupancy(format!("sensor-{}", i), (i + shift) % 3 != 0))
        .collect()
}

/// Benchmark transform with varying record counts
fn bench_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("transform");
    let config = TransformConfig::default();

    for count in [10usize, 100, 500, 2000].iter() {
        let records = occupancy_records(*count, 0);
        group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
            b.iter(|| transform(black_box(records), &config, 0));
        });
    }
    group.finish();
}

/// Benchmark snapshot comparison (hot path, every cycle)
fn bench_detect(c: &mut Criterion) {
    let config = TransformConfig::default();
    let previous = transform(&occupancy_records(500, 0), &config, 0);
    let next = transform(&occupancy_records(500, 1), &config, 1);

    c.bench_function("detect_500", |b| {
        b.iter(|| detect(black_box(Some(&previous)), black_box(&next)));
    });
}

/// Benchmark notable detection over an overlapping window
fn bench_detect_notable(c: &mut Criterion) {
    let config = TransformConfig::default();
    let policy = NotablePolicy::anomalous_scans();
    let window: Vec<_> = (0..200)
        .map(|i| {
            let outcome = if i % 10 == 0 { ScanOutcome::Threat } else { ScanOutcome::Clear };
            RawRecord::scan(format!("scan-{}", i), outcome).at("Gate A")
        })
        .collect();

    c.bench_function("detect_notable_window_200", |b| {
        let mut tracker = IdempotencyTracker::new(1000);
        b.iter(|| detect_notable(black_box(&window), &mut tracker, &policy, &config));
    });
}

criterion_group!(benches, bench_transform, bench_detect, bench_detect_notable);
criterion_main!(benches);
