//! Criterion benchmarks for path simulation and surface assembly.
//!
//! Compares sequential and parallel drivers across ensemble sizes, and
//! measures the cost of smile memoisation and fitted smiles per surface.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use volsim_engine::simulation::{simulate_paths_parallel, simulate_paths_seeded, SimulationConfig};
use volsim_engine::surface::{SmileSource, SmileTemplate, SurfaceAssembler, SurfaceState};
use volsim_models::analytical::BlackScholesOracle;
use volsim_models::models::HestonParams;

const MATURITIES: [f64; 4] = [1.0 / 12.0, 0.25, 0.5, 1.0];
const DELTAS: [f64; 5] = [0.1, 0.25, 0.5, 0.75, 0.9];

fn grid(n_paths: usize, n_steps: usize) -> SimulationConfig {
    SimulationConfig::builder()
        .n_paths(n_paths)
        .n_steps(n_steps)
        .horizon(1.0)
        .build()
        .unwrap()
}

/// Benchmark path generation, sequential vs parallel.
fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("heston_paths");
    let params = HestonParams::default();

    for n_paths in [100, 1_000, 10_000] {
        let config = grid(n_paths, 252);

        group.bench_with_input(BenchmarkId::new("sequential", n_paths), &config, |b, config| {
            b.iter(|| simulate_paths_seeded(black_box(&params), config, 42).unwrap());
        });

        group.bench_with_input(BenchmarkId::new("parallel", n_paths), &config, |b, config| {
            b.iter(|| simulate_paths_parallel(black_box(&params), config, 42).unwrap());
        });
    }

    group.finish();
}

/// Benchmark one 4x5 surface under each smile source.
fn bench_single_surface(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_surface");
    let state = SurfaceState::new(100.0, 0.04);

    let anchored = SurfaceAssembler::new(BlackScholesOracle::new()).with_rate(0.01);
    group.bench_function("anchored", |b| {
        b.iter(|| {
            anchored
                .build_surface(&MATURITIES, &DELTAS, black_box(state))
                .unwrap()
        });
    });

    let template =
        SmileTemplate::new(vec![0.8, 0.9, 1.0, 1.1, 1.2], vec![0.03, 0.012, 0.0, -0.004, 0.0])
            .unwrap();
    let fitted = SurfaceAssembler::new(BlackScholesOracle::new())
        .with_rate(0.01)
        .with_smile_source(SmileSource::Fitted(template));
    group.bench_function("fitted", |b| {
        b.iter(|| fitted.build_surface(&MATURITIES, &DELTAS, black_box(state)));
    });

    group.finish();
}

/// Benchmark a full tensor build, sequential vs parallel.
fn bench_tensor(c: &mut Criterion) {
    let mut group = c.benchmark_group("surface_tensor");
    group.sample_size(10);

    let assembler = SurfaceAssembler::new(BlackScholesOracle::new()).with_rate(0.01);
    let paths = simulate_paths_parallel(&HestonParams::default(), &grid(64, 52), 7).unwrap();

    group.bench_function("sequential", |b| {
        b.iter(|| {
            assembler
                .build_tensor_sequential(&MATURITIES, &DELTAS, black_box(&paths))
                .unwrap()
        });
    });

    group.bench_function("parallel", |b| {
        b.iter(|| {
            assembler
                .build_tensor(&MATURITIES, &DELTAS, black_box(&paths))
                .unwrap()
        });
    });

    group.bench_function("parallel_no_memo", |b| {
        let assembler = assembler.clone().with_memoization(false);
        b.iter(|| {
            assembler
                .build_tensor(&MATURITIES, &DELTAS, black_box(&paths))
                .unwrap()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_simulation, bench_single_surface, bench_tensor);
criterion_main!(benches);
