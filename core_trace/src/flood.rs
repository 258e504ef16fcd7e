//! Depression filling by priority flood.
//!
//! After ingestion an interior node may have no strictly lower neighbour (a
//! pit or an enclosed plateau). Each such node is flooded lowest-first until
//! the water finds a way out, either a strictly lower node beyond the rim or
//! the edge of the loaded region, and everything it covered is collapsed
//! into a single flat lake node. Nodes touching the loaded region's edge are
//! never flooded; their water is assumed to drain off the map.

use std::{
    cmp::Ordering,
    collections::{BTreeSet, BinaryHeap},
};

use crate::{
    graph::{NodeId, WatershedGraph},
    grid::{GridPoint, Height},
    heightfield::HeightField,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloodSummary {
    pub low_nodes: usize,
    pub lakes: usize,
    pub cells_flooded: usize,
}

impl FloodSummary {
    fn absorb(&mut self, other: FloodSummary) {
        self.low_nodes += other.low_nodes;
        self.lakes += other.lakes;
        self.cells_flooded += other.cells_flooded;
    }
}

/// Whether any cell of `id` borders an unloaded cell.
pub fn node_touches_boundary(graph: &WatershedGraph, heights: &HeightField, id: NodeId) -> bool {
    graph
        .node(id)
        .points()
        .iter()
        .any(|point| heights.touches_boundary(*point))
}

/// Interior node with no strictly lower neighbour.
pub fn is_low_node(graph: &WatershedGraph, heights: &HeightField, id: NodeId) -> bool {
    let height = graph.height(id);
    graph
        .neighbors(id)
        .iter()
        .all(|neighbor| graph.height(*neighbor) >= height)
        && !node_touches_boundary(graph, heights, id)
}

/// Flood every low node of the whole graph.
pub fn fill_all(graph: &mut WatershedGraph, heights: &mut HeightField) -> FloodSummary {
    let candidates: Vec<NodeId> = graph.ids().collect();
    fill_depressions(graph, heights, candidates)
}

/// Flood the low nodes among `candidates`.
///
/// Candidates absorbed by an earlier lake in the same pass are skipped. The
/// result does not depend on candidate order beyond lake node ids.
pub fn fill_depressions(
    graph: &mut WatershedGraph,
    heights: &mut HeightField,
    candidates: impl IntoIterator<Item = NodeId>,
) -> FloodSummary {
    let candidates: BTreeSet<NodeId> = candidates.into_iter().collect();
    let low_nodes: Vec<NodeId> = candidates
        .into_iter()
        .filter(|id| graph.contains(*id) && is_low_node(graph, heights, *id))
        .collect();

    let mut summary = FloodSummary {
        low_nodes: low_nodes.len(),
        ..FloodSummary::default()
    };
    for low in low_nodes {
        if !graph.contains(low) || !is_low_node(graph, heights, low) {
            continue;
        }
        summary.absorb(flood_from(graph, heights, low));
    }

    if summary.lakes > 0 {
        tracing::debug!(
            target: "river_trace::flood",
            low_nodes = summary.low_nodes,
            lakes = summary.lakes,
            cells_flooded = summary.cells_flooded,
            "flood.pass_complete"
        );
    }
    summary
}

/// Raise water from `low` until it spills, then collapse the lake.
fn flood_from(graph: &mut WatershedGraph, heights: &mut HeightField, low: NodeId) -> FloodSummary {
    let seed = graph.node(low).representative();
    let mut lake_height = graph.height(low);
    let mut heap = BinaryHeap::new();
    let mut queued = BTreeSet::from([low]);
    let mut merging = BTreeSet::new();
    heap.push(FloodEntry::of(graph, low));

    let spillway = loop {
        let Some(entry) = heap.pop() else {
            panic!("flood heap exhausted before a spillway was found (lake seeded at {seed})");
        };
        if entry.height < lake_height {
            break Some(entry.id);
        }
        lake_height = entry.height;
        merging.insert(entry.id);
        if node_touches_boundary(graph, heights, entry.id) {
            break None;
        }
        for neighbor in graph.neighbors(entry.id) {
            if queued.insert(*neighbor) {
                heap.push(FloodEntry::of(graph, *neighbor));
            }
        }
    };

    // Flatten the rim: anything left at exactly the lake height joins the lake.
    while let Some(entry) = heap.pop() {
        match entry.height.cmp(&lake_height) {
            Ordering::Less => continue,
            Ordering::Greater => break,
            Ordering::Equal => {
                merging.insert(entry.id);
                for neighbor in graph.neighbors(entry.id) {
                    if queued.insert(*neighbor) {
                        heap.push(FloodEntry::of(graph, *neighbor));
                    }
                }
            }
        }
    }

    let lake = graph.replace(&merging, lake_height);
    let mut cells_flooded = 0;
    for point in graph.node(lake).points() {
        if heights.set(*point, lake_height) != lake_height {
            cells_flooded += 1;
        }
    }

    debug_assert!(
        node_touches_boundary(graph, heights, lake)
            || graph
                .neighbors(lake)
                .iter()
                .any(|n| graph.height(*n) < lake_height),
        "lake at {seed} has no outflow"
    );

    tracing::trace!(
        target: "river_trace::flood",
        %seed,
        lake_height,
        merged_nodes = merging.len(),
        cells = graph.node(lake).len(),
        cells_flooded,
        spillway = ?spillway.map(|id| graph.node(id).representative()),
        "flood.lake_filled"
    );

    FloodSummary {
        low_nodes: 0,
        lakes: 1,
        cells_flooded,
    }
}

/// Min-heap entry ordered by height, then by node key.
#[derive(Copy, Clone, Debug)]
struct FloodEntry {
    height: Height,
    representative: GridPoint,
    id: NodeId,
}

impl FloodEntry {
    fn of(graph: &WatershedGraph, id: NodeId) -> Self {
        let node = graph.node(id);
        Self {
            height: node.height(),
            representative: node.representative(),
            id,
        }
    }
}

impl PartialEq for FloodEntry {
    fn eq(&self, other: &Self) -> bool {
        self.height == other.height && self.id == other.id
    }
}

impl Eq for FloodEntry {}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloodEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .height
            .cmp(&self.height)
            .then_with(|| other.representative.cmp(&self.representative))
            .then_with(|| other.id.cmp(&self.id))
    }
}
