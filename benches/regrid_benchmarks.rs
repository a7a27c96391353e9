//! Benchmarks for weight generation and application.
//!
//! Run with: cargo bench --bench regrid_benchmarks
//! Or: cargo bench --bench regrid_benchmarks -- apply

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

use regridder::{
    Discretization, Field, RegridManager, RegridMethod, RegridOptions, StaggerLocation,
    StructuredGrid, UnmappedAction, ZeroRegion,
};

/// Smooth field on a global grid
fn global_field(nx: usize, ny: usize) -> Field {
    let grid: Arc<Discretization> = Arc::new(StructuredGrid::global(nx, ny).unwrap().into());
    Field::from_fn("t", grid, StaggerLocation::Center, |lon, lat| {
        2.0 + lat.to_radians().cos().powi(2) * (2.0 * lon.to_radians()).cos()
    })
    .unwrap()
}

fn empty_field(nx: usize, ny: usize) -> Field {
    let grid: Arc<Discretization> = Arc::new(StructuredGrid::global(nx, ny).unwrap().into());
    Field::new("out", grid, StaggerLocation::Center)
}

// =============================================================================
// STORE BENCHMARKS
// =============================================================================

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    group.sample_size(10);

    let manager = RegridManager::new();
    // (src_nx, src_ny, dst_nx, dst_ny, name)
    let scenarios = [(144, 72, 96, 48, "2.5deg_to_3.75deg"), (72, 36, 144, 72, "upscale_2x")];
    let methods = [
        RegridMethod::Bilinear,
        RegridMethod::Patch,
        RegridMethod::Conserve,
        RegridMethod::NearestStod,
        RegridMethod::NearestDtos,
    ];

    for (src_nx, src_ny, dst_nx, dst_ny, name) in scenarios {
        let src = global_field(src_nx, src_ny);
        let dst = empty_field(dst_nx, dst_ny);
        group.throughput(Throughput::Elements((dst_nx * dst_ny) as u64));

        for method in methods {
            let options = RegridOptions::new(method).with_unmapped_action(UnmappedAction::Ignore);
            group.bench_with_input(BenchmarkId::new(name, method.name()), &options, |b, options| {
                b.iter(|| manager.store(black_box(&src), black_box(&dst), options).unwrap());
            });
        }
    }

    group.finish();
}

// =============================================================================
// APPLY BENCHMARKS
// =============================================================================

fn bench_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("apply");

    let manager = RegridManager::new();
    let src = global_field(288, 144);
    let mut dst = empty_field(192, 96);
    let options =
        RegridOptions::new(RegridMethod::Conserve).with_unmapped_action(UnmappedAction::Ignore);
    let handle = manager.store(&src, &dst, &options).unwrap();

    group.throughput(Throughput::Elements(dst.len() as u64));
    for zero_region in [ZeroRegion::Total, ZeroRegion::Select, ZeroRegion::Empty] {
        group.bench_function(BenchmarkId::new("conserve", format!("{:?}", zero_region)), |b| {
            b.iter(|| handle.apply(black_box(&src), &mut dst, zero_region).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_store, bench_apply);
criterion_main!(benches);
