//! Tile ingestion: merge equal-height cells of a freshly loaded segment and
//! stitch them into the graph.

use std::collections::{BTreeSet, VecDeque};

use ahash::AHashSet;

use crate::{
    graph::WatershedGraph,
    grid::SegmentId,
    heightfield::HeightField,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub cells: usize,
    pub merges: usize,
    pub edges: usize,
}

/// Add every cell of `segment` to `graph`.
///
/// The segment must already be active in `heights`. Each cell starts as a
/// singleton node; every 4-connected equal-height component reachable from the
/// segment (which may extend into previously loaded segments, including flat
/// filled lakes) is collapsed into one node, and each cell of the segment is
/// then connected to the nodes of its differently-owned neighbours.
///
/// Running it again for the same segment is a no-op.
pub fn ingest_segment(
    graph: &mut WatershedGraph,
    heights: &HeightField,
    segment: SegmentId,
) -> IngestSummary {
    let points = heights.points_in(segment);
    assert!(
        !points.is_empty(),
        "segment {segment} must be loaded before ingestion"
    );
    let mut summary = IngestSummary {
        cells: points.len(),
        ..IngestSummary::default()
    };

    for &point in &points {
        if graph.owner(point).is_none() {
            graph.insert(vec![point], heights.height(point));
        }
    }

    let mut visited: AHashSet<_> = AHashSet::with_capacity(points.len());
    let mut queue = VecDeque::new();
    for &point in &points {
        if visited.contains(&point) {
            continue;
        }
        let height = heights.height(point);
        let mut owners = BTreeSet::new();
        visited.insert(point);
        queue.push_back(point);
        while let Some(vertex) = queue.pop_front() {
            if let Some(owner) = graph.owner(vertex) {
                owners.insert(owner);
            }
            for neighbor in vertex.neighbors() {
                if heights.get(neighbor) == Some(height) && visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        if owners.len() > 1 {
            graph.replace(&owners, height);
            summary.merges += 1;
        }
    }

    for &point in &points {
        let Some(key) = graph.owner(point) else {
            panic!("cell {point} lost its owner during ingestion");
        };
        for neighbor in point.neighbors() {
            if let Some(other) = graph.owner(neighbor) {
                if other != key && graph.connect(key, other) {
                    summary.edges += 1;
                }
            }
        }
    }

    tracing::debug!(
        target: "river_trace::ingest",
        %segment,
        cells = summary.cells,
        merges = summary.merges,
        edges = summary.edges,
        nodes = graph.len(),
        "tile.ingested"
    );

    summary
}
