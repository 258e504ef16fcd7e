use core_trace::{
    FlowTracer, GridExtent, GridPoint, RasterSource, SegmentId, SyntheticTerrain, TraceConfig,
    WatershedMap,
};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn bench_load_segment(c: &mut Criterion) {
    let mut group = c.benchmark_group("load_segment");

    for size in [32u32, 64, 128] {
        group.bench_with_input(BenchmarkId::new("grid", size), &size, |b, &size| {
            b.iter_batched(
                || {
                    let extent = GridExtent::new(size as i64, size as i64);
                    let terrain = SyntheticTerrain::new(extent, 7).with_feature_size(16.0);
                    let map = WatershedMap::new(size, extent);
                    (terrain, map)
                },
                |(mut terrain, mut map)| {
                    map.load_segment(&mut terrain, SegmentId::new(0, 0))
                        .expect("synthetic terrain never fails");
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

fn bench_trace(c: &mut Criterion) {
    let mut group = c.benchmark_group("trace");

    for grid_size in [32u32, 64] {
        group.bench_with_input(
            BenchmarkId::new("grid_size", grid_size),
            &grid_size,
            |b, &grid_size| {
                b.iter_batched(
                    || SyntheticTerrain::new(GridExtent::new(256, 512), 11).with_tilt(0.5),
                    |mut terrain| {
                        let config = TraceConfig {
                            grid_size,
                            ..TraceConfig::default()
                        };
                        let extent = terrain.extent();
                        let mut tracer =
                            FlowTracer::new(&mut terrain, config).expect("valid config");
                        tracer
                            .trace(GridPoint::new(128, 8), GridPoint::new(128, extent.cols - 1))
                            .expect("synthetic terrain never fails")
                    },
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.finish();
}

criterion_group!(trace_benches, bench_load_segment, bench_trace);
criterion_main!(trace_benches);
