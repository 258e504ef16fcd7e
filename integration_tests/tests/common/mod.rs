#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use core_trace::{GridPoint, Height, InMemoryRaster, TraceConfig, TraceReport};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

static INIT: Once = Once::new();

/// Point `RIVER_TRACE_CONFIG_PATH` at the fixture config, once per test binary.
pub fn ensure_test_config() -> PathBuf {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("trace_config.json");
    INIT.call_once(|| {
        debug_assert!(
            config_path.exists(),
            "missing test trace config at {}",
            config_path.display()
        );
        std::env::set_var(core_trace::TRACE_CONFIG_ENV, &config_path);
    });
    config_path
}

pub fn p(row: i64, col: i64) -> GridPoint {
    GridPoint::new(row, col)
}

pub fn verified_config(grid_size: u32) -> TraceConfig {
    TraceConfig {
        grid_size,
        verify: true,
        ..TraceConfig::default()
    }
}

/// A valley along row `floor_row` falling 10 per column towards the east,
/// with walls rising 3 per row on either side. No two neighbours share a
/// height and nothing needs flooding.
pub fn eastward_valley(rows: usize, cols: usize, floor_row: i64) -> InMemoryRaster {
    InMemoryRaster::from_fn(rows, cols, |q| {
        (10_000 - 10 * q.col + 3 * (q.row - floor_row).abs()) as Height
    })
}

/// Rough terrain with a handful of height levels, so plateaus, pits and
/// equal-height seams across segments are common.
pub fn rough_terrain(seed: u64, rows: usize, cols: usize, levels: Height) -> InMemoryRaster {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    InMemoryRaster::from_fn(rows, cols, |_| rng.gen_range(0..levels))
}

/// Rough terrain on top of a slope towards the east edge.
pub fn tilted_rough_terrain(seed: u64, rows: usize, cols: usize) -> InMemoryRaster {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    InMemoryRaster::from_fn(rows, cols, |q| {
        (2 * (cols as i64 - q.col)) as Height + rng.gen_range(0..8)
    })
}

/// Routed cells are 4-connected and never climb.
pub fn assert_routed_path_is_downhill(report: &TraceReport) {
    assert_eq!(report.points.first().map(|t| t.point), Some(report.start));
    for pair in report.points.windows(2) {
        assert!(
            pair[0].point.is_adjacent(pair[1].point),
            "{} and {} are not adjacent",
            pair[0].point,
            pair[1].point
        );
        assert!(
            pair[1].height <= pair[0].height,
            "path climbs from {} to {}",
            pair[0].point,
            pair[1].point
        );
    }
}
