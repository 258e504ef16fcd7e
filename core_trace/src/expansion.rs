//! The loaded part of the raster and the graph built over it.
//!
//! [`WatershedMap`] owns the height field and the graph and is the only place
//! that mutates them. Loading a segment runs the full pipeline (read,
//! ingest, flood, optionally verify) before returning, so readers never see a
//! tile that has not been stabilised.

use std::collections::BTreeSet;

use crate::{
    flood::{self, fill_depressions},
    graph::{NodeId, WatershedGraph},
    grid::{GridExtent, GridPoint, SegmentId},
    heightfield::HeightField,
    ingest::ingest_segment,
    metrics::TraceMetrics,
    raster::{RasterError, RasterSource},
    tracer::TraceError,
    verify::verify_all,
};

#[derive(Debug, Clone)]
pub struct WatershedMap {
    heights: HeightField,
    graph: WatershedGraph,
    metrics: TraceMetrics,
    verify: bool,
}

impl WatershedMap {
    pub fn new(grid_size: u32, extent: GridExtent) -> Self {
        Self {
            heights: HeightField::new(grid_size, extent),
            graph: WatershedGraph::new(),
            metrics: TraceMetrics::default(),
            verify: false,
        }
    }

    /// Run the full invariant scans after every load.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn heights(&self) -> &HeightField {
        &self.heights
    }

    pub fn graph(&self) -> &WatershedGraph {
        &self.graph
    }

    pub fn metrics(&self) -> &TraceMetrics {
        &self.metrics
    }

    pub(crate) fn metrics_mut(&mut self) -> &mut TraceMetrics {
        &mut self.metrics
    }

    pub fn extent(&self) -> GridExtent {
        self.heights.extent()
    }

    pub fn owner(&self, point: GridPoint) -> Option<NodeId> {
        self.graph.owner(point)
    }

    pub fn node_touches_boundary(&self, id: NodeId) -> bool {
        flood::node_touches_boundary(&self.graph, &self.heights, id)
    }

    /// Load `segment` from `source` and stabilise the graph around it.
    ///
    /// Returns `false` when the segment was already active.
    pub fn load_segment<S>(&mut self, source: &mut S, segment: SegmentId) -> Result<bool, TraceError>
    where
        S: RasterSource + ?Sized,
    {
        if self.heights.is_active(segment) {
            return Ok(false);
        }
        let Some(window) = self.heights.segment_window(segment) else {
            panic!(
                "segment {segment} lies outside raster {}",
                self.heights.extent()
            );
        };

        let values = source.read_window(window)?;
        if values.len() != window.cells() {
            return Err(RasterError::ShortRead {
                window,
                expected: window.cells(),
                actual: values.len(),
            }
            .into());
        }
        self.heights.insert_tile(segment, values);

        let ingest = ingest_segment(&mut self.graph, &self.heights, segment);
        self.metrics.record_ingest(ingest);

        // Only nodes inside the tile or on the ring around it can have changed
        // from boundary to interior.
        let candidates: BTreeSet<NodeId> = window
            .grow(1)
            .points()
            .filter_map(|point| self.graph.owner(point))
            .collect();
        let flood = fill_depressions(&mut self.graph, &mut self.heights, candidates);
        self.metrics.record_flood(flood);

        if self.verify {
            verify_all(&self.graph, &self.heights)?;
        }

        tracing::debug!(
            target: "river_trace::expand",
            %segment,
            cells = window.cells(),
            lakes = flood.lakes,
            nodes = self.graph.len(),
            active_segments = self.heights.segment_count(),
            "segment.loaded"
        );
        Ok(true)
    }

    /// Inactive in-raster segments bordering any cell of `id`.
    pub fn segments_to_expand(&self, id: NodeId) -> BTreeSet<SegmentId> {
        self.graph
            .node(id)
            .points()
            .iter()
            .flat_map(|point| self.heights.missing_segments(*point))
            .collect()
    }

    /// Load every segment [`Self::segments_to_expand`] names for `id`.
    ///
    /// `id` may be retired by the resulting merges; callers re-resolve through
    /// [`Self::owner`]. Returns the number of segments loaded.
    pub fn expand_around<S>(&mut self, source: &mut S, id: NodeId) -> Result<usize, TraceError>
    where
        S: RasterSource + ?Sized,
    {
        let segments = self.segments_to_expand(id);
        let mut loaded = 0;
        for segment in &segments {
            if self.load_segment(source, *segment)? {
                loaded += 1;
            }
        }
        tracing::debug!(
            target: "river_trace::expand",
            node = %id,
            segments = loaded,
            "expand.around_node"
        );
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::InMemoryRaster;

    fn p(row: i64, col: i64) -> GridPoint {
        GridPoint::new(row, col)
    }

    #[test]
    fn loading_is_idempotent() {
        let mut raster = InMemoryRaster::from_fn(4, 4, |q| (q.row * 4 + q.col) as i32);
        let mut map = WatershedMap::new(2, raster.extent()).with_verification(true);
        assert!(map.load_segment(&mut raster, SegmentId::new(0, 0)).unwrap());
        let graph = map.graph().clone();
        assert!(!map.load_segment(&mut raster, SegmentId::new(0, 0)).unwrap());
        assert_eq!(map.graph(), &graph);
        assert_eq!(raster.reads(), 1);
        assert_eq!(map.metrics().tiles_loaded, 1);
    }

    #[test]
    fn expansion_loads_every_missing_neighbour_segment() {
        let mut raster = InMemoryRaster::from_fn(4, 4, |q| (q.row + q.col) as i32);
        let mut map = WatershedMap::new(2, raster.extent());
        map.load_segment(&mut raster, SegmentId::new(0, 0)).unwrap();
        let corner = map.owner(p(1, 1)).unwrap();
        assert_eq!(
            map.segments_to_expand(corner),
            BTreeSet::from([SegmentId::new(0, 1), SegmentId::new(1, 0)])
        );

        let loaded = map.expand_around(&mut raster, corner).unwrap();

        assert_eq!(loaded, 2);
        assert_eq!(map.heights().segment_count(), 3);
        let corner = map.owner(p(1, 1)).unwrap();
        assert!(map.segments_to_expand(corner).is_empty());
        assert!(!map.node_touches_boundary(corner));
    }

    #[test]
    fn pits_revealed_by_a_new_tile_are_filled() {
        // The 1 at (1, 2) only becomes an interior pit once the segment south
        // of it is loaded.
        let rows = vec![
            vec![9, 9, 9, 9],
            vec![9, 5, 1, 9],
            vec![9, 3, 9, 9],
            vec![9, 0, 9, 9],
        ];
        let mut raster = InMemoryRaster::from_rows(rows).unwrap();
        let mut map = WatershedMap::new(2, raster.extent()).with_verification(true);
        for segment in [
            SegmentId::new(0, 0),
            SegmentId::new(1, 0),
            SegmentId::new(0, 1),
            SegmentId::new(1, 1),
        ] {
            map.load_segment(&mut raster, segment).unwrap();
        }
        let lake = map.owner(p(1, 2)).unwrap();
        assert_eq!(map.graph().height(lake), 5);
        assert!(map.graph().node(lake).contains(p(1, 1)));
        assert!(map.metrics().lakes_filled >= 1);
    }

    #[test]
    fn short_reads_are_reported() {
        struct Truncating;
        impl RasterSource for Truncating {
            fn extent(&self) -> GridExtent {
                GridExtent::new(2, 2)
            }
            fn read_window(
                &mut self,
                _window: crate::grid::RasterWindow,
            ) -> Result<Vec<i32>, RasterError> {
                Ok(vec![1])
            }
        }
        let mut map = WatershedMap::new(2, GridExtent::new(2, 2));
        let err = map
            .load_segment(&mut Truncating, SegmentId::new(0, 0))
            .unwrap_err();
        assert!(matches!(
            err,
            TraceError::Raster(RasterError::ShortRead {
                expected: 4,
                actual: 1,
                ..
            })
        ));
        assert_eq!(map.heights().segment_count(), 0);
    }
}
