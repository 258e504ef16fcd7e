use core_trace::{
    verify_all, FlowTracer, GridPoint, Height, InMemoryRaster, RasterSource, SegmentId,
    TraceConfig, TraceReport, TraceStatus, WatershedMap,
};

fn p(row: i64, col: i64) -> GridPoint {
    GridPoint::new(row, col)
}

fn config(grid_size: u32) -> TraceConfig {
    TraceConfig {
        grid_size,
        verify: true,
        ..TraceConfig::default()
    }
}

/// A flat 100 plain with a walled pit at (5, 5). The wall of 30s is broken
/// by a 20 at (5, 6), beyond which the ground falls away to the east edge.
fn pit_raster() -> InMemoryRaster {
    InMemoryRaster::from_fn(10, 10, |q| match (q.row, q.col) {
        (5, 5) => 10,
        (4, 4) | (4, 5) | (4, 6) | (5, 4) | (6, 4) | (6, 5) | (6, 6) => 30,
        (5, 6) => 20,
        (5, 7) => 15,
        (5, 8) => 12,
        (5, 9) => 5,
        _ => 100,
    })
}

fn render(report: &TraceReport, rows: i64, cols: i64) -> String {
    (0..rows)
        .map(|row| {
            (0..cols)
                .map(|col| {
                    if report.points.iter().any(|traced| traced.point == p(row, col)) {
                        '*'
                    } else {
                        '.'
                    }
                })
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn pit_fills_up_to_its_spill_point() {
    let mut raster = pit_raster();
    let mut map = WatershedMap::new(10, raster.extent()).with_verification(true);
    map.load_segment(&mut raster, SegmentId::new(0, 0)).unwrap();

    let graph = map.graph();
    let lake = graph.owner(p(5, 5)).unwrap();
    assert_eq!(graph.node(lake).points(), &[p(5, 5), p(5, 6)]);
    assert_eq!(graph.height(lake), 20);
    assert_eq!(map.heights().height(p(5, 5)), 20);

    let outflow = graph.owner(p(5, 7)).unwrap();
    assert!(graph.neighbors(lake).contains(&outflow));

    // Follow the steepest descent from the outflow; it must reach the edge.
    let mut current = outflow;
    loop {
        let lower = graph
            .neighbors(current)
            .iter()
            .copied()
            .filter(|n| graph.height(*n) < graph.height(current))
            .min_by(|a, b| graph.height_key_cmp(*a, *b));
        match lower {
            Some(next) => current = next,
            None => break,
        }
    }
    assert!(map.node_touches_boundary(current));
    assert_eq!(graph.node(current).points(), &[p(5, 9)]);
    assert_eq!(verify_all(graph, map.heights()), Ok(()));
}

#[test]
fn trace_out_of_a_pit_follows_the_spillway() {
    let mut raster = pit_raster();
    let mut tracer = FlowTracer::new(&mut raster, config(10)).unwrap();
    let report = tracer.trace(p(5, 5), p(5, 9)).unwrap();

    assert_eq!(report.status, TraceStatus::Finished);
    let cells: Vec<_> = report.points.iter().map(|t| (t.point, t.height)).collect();
    assert_eq!(
        cells,
        vec![
            (p(5, 5), 20),
            (p(5, 6), 20),
            (p(5, 7), 15),
            (p(5, 8), 12),
            (p(5, 9), 5)
        ]
    );
    assert_eq!(report.expansions, 0);
}

#[test]
fn strictly_decreasing_grid_is_walked_without_expansion() {
    let mut raster = InMemoryRaster::from_fn(4, 4, |q| (4 * q.row + q.col) as Height);
    let mut tracer = FlowTracer::new(&mut raster, config(4)).unwrap();
    let report = tracer.trace(p(3, 3), p(0, 0)).unwrap();

    assert_eq!(report.status, TraceStatus::Finished);
    assert_eq!(report.expansions, 0);
    assert_eq!(report.steps, 6);
    assert_eq!(report.profile.total_descent, 15);
    assert_eq!(report.points.first().map(|t| t.height), Some(15));
    assert_eq!(report.points.last().map(|t| t.height), Some(0));
    assert!(report
        .points
        .windows(2)
        .all(|w| w[0].point.is_adjacent(w[1].point) && w[1].height < w[0].height));

    insta::assert_snapshot!(render(&report, 4, 4), @r###"
    ****
    ...*
    ...*
    ...*
    "###);
}

#[test]
fn report_serialises_status_and_points() {
    let mut raster = InMemoryRaster::from_rows(vec![vec![3, 2, 1]]).unwrap();
    let mut tracer = FlowTracer::new(&mut raster, config(4)).unwrap();
    let report = tracer.trace(p(0, 0), p(0, 2)).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"]["kind"], "finished");
    assert_eq!(json["points"][2]["point"]["col"], 2);
    assert_eq!(json["points"][2]["height"], 1);
}
