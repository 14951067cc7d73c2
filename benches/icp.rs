use criterion::{Criterion, criterion_group, criterion_main};
use lidarscan::{IcpOptions, Point2, RigidParams, register};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

/// A sawtooth wall with a little range noise, roughly what a slice of a corrugated panel looks
/// like from a couple of meters away.
fn panel(n: usize, rng: &mut StdRng) -> Vec<Point2> {
    (0..n)
        .map(|i| {
            let x = i as f64 * 3.0 - 1.5 * n as f64;
            let tooth = (i % 40) as f64 * 2.0;
            Point2::new(x, 2000.0 + tooth + rng.random_range(-0.5..0.5))
        })
        .collect()
}

fn registration(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let source = panel(600, &mut rng);
    let target = RigidParams::new(12.0, -8.0, 0.03).apply_all(&source);

    let parallel = IcpOptions::default();
    let sequential = IcpOptions {
        parallel: false,
        ..IcpOptions::default()
    };

    c.bench_function("register_parallel", |b| {
        b.iter(|| register(black_box(&source), black_box(&target), &parallel))
    });
    c.bench_function("register_sequential", |b| {
        b.iter(|| register(black_box(&source), black_box(&target), &sequential))
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = registration
}
criterion_main!(benches);
