use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use patched_conics::constants::Vec2;
use patched_conics::kepler::{advance, solve_hyperbolic_kepler_equation, solve_kepler_equation};
use patched_conics::orbit_type::OrbitalElements;
use patched_conics::params::PropagationParams;
use patched_conics::universal::propagate;

/// Uniform random in [0, 2π)
#[inline]
fn rand_angle(rng: &mut StdRng) -> f64 {
    rng.random::<f64>() * std::f64::consts::TAU
}

/// Typical regime: e ∈ [0.0, 0.7]
fn bench_typical(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xDEADBEEF);
    let samples = 10_000usize;

    c.bench_function("solve_kepler_equation/typical_e<=0.7", |b| {
        b.iter_batched(
            || {
                // Pre-generate inputs to avoid RNG cost in the timed section
                (0..samples)
                    .map(|_| (rng.random_range(0.0..=0.7), rand_angle(&mut rng)))
                    .collect::<Vec<_>>()
            },
            |cases| {
                for (e, m) in cases {
                    black_box(solve_kepler_equation(black_box(e), black_box(m), 6, 1e-6));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// High-eccentricity (still elliptic): e ∈ [0.7, 0.95]
fn bench_high_e(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xBADF00D);
    let samples = 10_000usize;

    c.bench_function("solve_kepler_equation/high_e_0.7..0.95", |b| {
        b.iter_batched(
            || {
                (0..samples)
                    .map(|_| (rng.random_range(0.7..0.95), rand_angle(&mut rng)))
                    .collect::<Vec<_>>()
            },
            |cases| {
                for (e, m) in cases {
                    black_box(solve_kepler_equation(black_box(e), black_box(m), 6, 1e-6));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// Hyperbolic regime: e ∈ [1.1, 5.0], |M| up to 50
fn bench_hyperbolic(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0xFEEDFACE);
    let samples = 10_000usize;

    c.bench_function("solve_kepler_equation/hyperbolic_e_1.1..5", |b| {
        b.iter_batched(
            || {
                (0..samples)
                    .map(|_| (rng.random_range(1.1..5.0), rng.random_range(-50.0..50.0)))
                    .collect::<Vec<_>>()
            },
            |cases| {
                for (e, m) in cases {
                    black_box(solve_hyperbolic_kepler_equation(
                        black_box(e),
                        black_box(m),
                        6,
                        1e-6,
                    ));
                }
            },
            BatchSize::LargeInput,
        )
    });
}

/// Full analytic step against the element-free universal-variable step.
fn bench_propagators(c: &mut Criterion) {
    let params = PropagationParams::default();
    let r = Vec2::new(10.0, 0.0);
    let v = Vec2::new(0.0, 3.0);
    let elements = OrbitalElements::from_state(&r, &v, 100.0).unwrap();

    c.bench_function("propagation/kepler_advance", |b| {
        b.iter(|| black_box(advance(&elements, black_box(1.0), &params)))
    });
    c.bench_function("propagation/universal_propagate", |b| {
        b.iter(|| black_box(propagate(&r, &v, black_box(1.0), 100.0, &params).ok()))
    });
}

criterion_group!(
    name = benches;
    config = Criterion::default();
    targets = bench_typical, bench_high_e, bench_hyperbolic, bench_propagators
);
criterion_main!(benches);
