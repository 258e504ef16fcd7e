mod common;

use core_trace::{FlowTracer, TraceReport};

fn trace_rough(seed: u64) -> TraceReport {
    let mut raster = common::tilted_rough_terrain(seed, 48, 96);
    let mut tracer = FlowTracer::new(&mut raster, common::verified_config(16)).unwrap();
    tracer.trace(common::p(24, 3), common::p(30, 95)).unwrap()
}

#[test]
fn identical_inputs_produce_identical_reports() {
    for seed in [1, 7, 42] {
        let a = trace_rough(seed);
        let b = trace_rough(seed);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}

#[test]
fn retracing_reuses_loaded_segments_and_cached_hops() {
    // No equal heights and nothing to flood, so expansions never merge nodes
    // and both traces walk the same node sequence.
    let mut raster = common::eastward_valley(32, 64, 14);
    let mut tracer = FlowTracer::new(&mut raster, common::verified_config(16)).unwrap();
    let first = tracer.trace(common::p(14, 4), common::p(14, 37)).unwrap();
    let loaded = tracer.map().heights().segment_count();
    let cached = tracer.router().cached_hops();

    let second = tracer.trace(common::p(14, 4), common::p(14, 37)).unwrap();

    assert!(first.expansions > 0);
    assert_eq!(second.expansions, 0);
    assert_eq!(tracer.map().heights().segment_count(), loaded);
    assert_eq!(tracer.router().cached_hops(), cached);
    assert_eq!(first.points, second.points);
    assert_eq!(first.fingerprint, second.fingerprint);
    let hits = second.metrics.router_cache_hits - first.metrics.router_cache_hits;
    assert_eq!(hits, (second.nodes.len() - 1) as u64);
}
