//! Literal cell-by-cell routes through traced nodes.
//!
//! The tracer only records which nodes the flow passes through. A node may be
//! a large plateau or lake, so the router expands each hop into a shortest
//! 4-connected walk restricted to the node's own cells, from the cell where
//! the flow entered to the spill cell that borders the next node.

use std::collections::{BTreeMap, VecDeque};

use ahash::AHashMap;
use serde::Serialize;

use crate::{
    graph::{Node, NodeId, WatershedGraph},
    grid::{GridPoint, Height},
    heightfield::HeightField,
    metrics::TraceMetrics,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TracedPoint {
    pub point: GridPoint,
    pub height: Height,
}

/// Routes node sequences into cells, caching each hop.
///
/// Node ids are never reused and a node's cells never change, so a cached hop
/// stays valid however the graph evolves around it.
#[derive(Debug, Default, Clone)]
pub struct PathRouter {
    hops: BTreeMap<(GridPoint, NodeId, NodeId), Vec<GridPoint>>,
}

impl PathRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_hops(&self) -> usize {
        self.hops.len()
    }

    /// Expand `nodes` into a cell path that starts at `start` and ends at the
    /// cell of the last node closest to `destination`.
    ///
    /// `start` must belong to `nodes[0]` and consecutive nodes must be
    /// neighbours.
    pub fn route(
        &mut self,
        graph: &WatershedGraph,
        heights: &HeightField,
        nodes: &[NodeId],
        start: GridPoint,
        destination: GridPoint,
        metrics: &mut TraceMetrics,
    ) -> Vec<TracedPoint> {
        let Some((&last, hops)) = nodes.split_last() else {
            return Vec::new();
        };
        assert!(
            graph.node(nodes[0]).contains(start),
            "route start {start} is not a cell of {}",
            nodes[0]
        );

        let mut cells = vec![start];
        let mut entry = start;
        for (index, &node) in hops.iter().enumerate() {
            let next = nodes[index + 1];
            let key = (entry, node, next);
            let hop = match self.hops.get(&key) {
                Some(hop) => {
                    metrics.router_cache_hits += 1;
                    hop.clone()
                }
                None => {
                    metrics.router_cache_misses += 1;
                    let hop = route_hop(graph, heights, entry, node, next);
                    self.hops.insert(key, hop.clone());
                    hop
                }
            };
            entry = *hop
                .last()
                .unwrap_or_else(|| panic!("empty hop from {node} to {next}"));
            cells.extend(hop);
        }

        let tail = graph.node(last);
        let target = tail
            .points()
            .iter()
            .copied()
            .min_by_key(|point| (point.manhattan_to(destination), *point))
            .unwrap_or(entry);
        let Some(search) = FloodSearch::run(tail, entry) else {
            panic!("entry cell {entry} is outside node {last}");
        };
        cells.extend(search.path_to(target).into_iter().skip(1));

        tracing::trace!(
            target: "river_trace::router",
            nodes = nodes.len(),
            cells = cells.len(),
            cached_hops = self.hops.len(),
            "route.complete"
        );

        cells
            .into_iter()
            .map(|point| TracedPoint {
                point,
                height: heights.height(point),
            })
            .collect()
    }
}

/// Cells from just after `entry` to the first cell of `next`.
///
/// The exit is the lowest cell of `node` bordering `next`, ties broken by
/// distance from `entry` and then by position; the step into `next` lands on
/// its lowest adjacent cell.
fn route_hop(
    graph: &WatershedGraph,
    heights: &HeightField,
    entry: GridPoint,
    node: NodeId,
    next: NodeId,
) -> Vec<GridPoint> {
    let current = graph.node(node);
    let target = graph.node(next);
    let Some(search) = FloodSearch::run(current, entry) else {
        panic!("entry cell {entry} is outside node {node}");
    };

    let crossing = current
        .points()
        .iter()
        .filter_map(|exit| {
            let landing = exit
                .neighbors()
                .into_iter()
                .filter(|cell| target.contains(*cell))
                .min_by_key(|cell| (heights.height(*cell), *cell))?;
            let distance = search.distance(*exit)?;
            Some((
                heights.height(*exit),
                heights.height(landing),
                distance,
                *exit,
                landing,
            ))
        })
        .min();
    let Some((_, _, _, exit, landing)) = crossing else {
        panic!("node {node} does not border {next}");
    };

    let mut hop: Vec<GridPoint> = search.path_to(exit).into_iter().skip(1).collect();
    hop.push(landing);
    hop
}

/// Breadth-first distances inside a single node.
struct FloodSearch {
    origin: GridPoint,
    parents: AHashMap<GridPoint, (GridPoint, u32)>,
}

impl FloodSearch {
    fn run(node: &Node, origin: GridPoint) -> Option<Self> {
        if !node.contains(origin) {
            return None;
        }
        let mut parents = AHashMap::with_capacity(node.len());
        parents.insert(origin, (origin, 0));
        let mut queue = VecDeque::from([origin]);
        while let Some(cell) = queue.pop_front() {
            let depth = parents[&cell].1;
            for neighbor in cell.neighbors() {
                if node.contains(neighbor) && !parents.contains_key(&neighbor) {
                    parents.insert(neighbor, (cell, depth + 1));
                    queue.push_back(neighbor);
                }
            }
        }
        Some(Self { origin, parents })
    }

    fn distance(&self, cell: GridPoint) -> Option<u32> {
        self.parents.get(&cell).map(|(_, depth)| *depth)
    }

    /// Path from the origin to `cell`, both included.
    fn path_to(&self, cell: GridPoint) -> Vec<GridPoint> {
        let mut path = vec![cell];
        let mut cursor = cell;
        while cursor != self.origin {
            let Some((parent, _)) = self.parents.get(&cursor) else {
                panic!("cell {cell} is not reachable from {}", self.origin);
            };
            cursor = *parent;
            path.push(cursor);
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{GridExtent, SegmentId};

    fn p(row: i64, col: i64) -> GridPoint {
        GridPoint::new(row, col)
    }

    /// A U-shaped lake at 2 draining east into a 1.
    fn lake_map() -> (WatershedGraph, HeightField) {
        let mut heights = HeightField::new(4, GridExtent::new(3, 4));
        #[rustfmt::skip]
        let values = vec![
            2, 9, 2, 1,
            2, 9, 2, 9,
            2, 2, 2, 9,
        ];
        heights.insert_tile(SegmentId::new(0, 0), values);
        let mut graph = WatershedGraph::new();
        let lake = graph.insert(
            vec![p(0, 0), p(1, 0), p(2, 0), p(2, 1), p(2, 2), p(1, 2), p(0, 2)],
            2,
        );
        let wall = graph.insert(vec![p(0, 1), p(1, 1)], 9);
        let outlet = graph.insert(vec![p(0, 3)], 1);
        let rim = graph.insert(vec![p(1, 3), p(2, 3)], 9);
        graph.connect(lake, wall);
        graph.connect(lake, outlet);
        graph.connect(lake, rim);
        graph.connect(outlet, rim);
        (graph, heights)
    }

    #[test]
    fn hops_follow_the_node_around_obstacles() {
        let (graph, heights) = lake_map();
        let lake = graph.owner(p(0, 0)).unwrap();
        let outlet = graph.owner(p(0, 3)).unwrap();
        let mut router = PathRouter::new();
        let mut metrics = TraceMetrics::default();

        let points = router.route(
            &graph,
            &heights,
            &[lake, outlet],
            p(0, 0),
            p(0, 3),
            &mut metrics,
        );

        let cells: Vec<_> = points.iter().map(|t| t.point).collect();
        assert_eq!(
            cells,
            vec![
                p(0, 0),
                p(1, 0),
                p(2, 0),
                p(2, 1),
                p(2, 2),
                p(1, 2),
                p(0, 2),
                p(0, 3)
            ]
        );
        assert!(cells.windows(2).all(|w| w[0].is_adjacent(w[1])));
        assert_eq!(points.last().unwrap().height, 1);
        assert_eq!(metrics.router_cache_misses, 1);
    }

    #[test]
    fn repeated_hops_hit_the_cache() {
        let (graph, heights) = lake_map();
        let lake = graph.owner(p(0, 0)).unwrap();
        let outlet = graph.owner(p(0, 3)).unwrap();
        let mut router = PathRouter::new();
        let mut metrics = TraceMetrics::default();

        let first = router.route(&graph, &heights, &[lake, outlet], p(0, 0), p(0, 3), &mut metrics);
        let second = router.route(&graph, &heights, &[lake, outlet], p(0, 0), p(0, 3), &mut metrics);

        assert_eq!(first, second);
        assert_eq!(metrics.router_cache_hits, 1);
        assert_eq!(metrics.router_cache_misses, 1);
        assert_eq!(router.cached_hops(), 1);
    }

    #[test]
    fn single_node_routes_towards_the_destination() {
        let (graph, heights) = lake_map();
        let lake = graph.owner(p(0, 0)).unwrap();
        let mut router = PathRouter::new();
        let mut metrics = TraceMetrics::default();
        let points = router.route(&graph, &heights, &[lake], p(2, 1), p(0, 2), &mut metrics);
        let cells: Vec<_> = points.iter().map(|t| t.point).collect();
        assert_eq!(cells, vec![p(2, 1), p(2, 2), p(1, 2), p(0, 2)]);
        assert_eq!(metrics.router_cache_misses, 0);
    }
}
