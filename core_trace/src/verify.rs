//! Full invariant scans over the graph and the height field.
//!
//! Each scan is O(graph size) and read-only, so the per-node work runs on the
//! rayon pool. They are meant for tests and for sessions started with
//! `verify` enabled, not for every production step.

use rayon::prelude::*;
use thiserror::Error;

use crate::{
    flood::node_touches_boundary,
    graph::{NodeId, WatershedGraph},
    grid::{GridPoint, Height, SegmentId},
    heightfield::HeightField,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("loaded cell {point} is not owned by any node")]
    Unowned { point: GridPoint },
    #[error("cell {point} of node {node} is owned by {owner:?}")]
    OwnerMismatch {
        point: GridPoint,
        node: NodeId,
        owner: Option<NodeId>,
    },
    #[error("node {node} owns unloaded cell {point}")]
    UnloadedCell { point: GridPoint, node: NodeId },
    #[error("{owned} cells are owned but {loaded} are loaded")]
    CellCount { owned: usize, loaded: usize },
    #[error("node {node} lists unknown neighbour {neighbor}")]
    DanglingNeighbor { node: NodeId, neighbor: NodeId },
    #[error("node {node} lists {neighbor}, which does not list it back")]
    Asymmetric { node: NodeId, neighbor: NodeId },
    #[error("node {node} lists itself as a neighbour")]
    SelfEdge { node: NodeId },
    #[error("cell {point} of node {node} has height {found}, node height is {expected}")]
    HeightMismatch {
        point: GridPoint,
        node: NodeId,
        expected: Height,
        found: Height,
    },
    #[error("adjacent cells {a} and {b} share a height but not a node")]
    UnmergedEqualHeight { a: GridPoint, b: GridPoint },
    #[error("adjacent cells {a} and {b} belong to nodes that are not neighbours")]
    MissingEdge { a: GridPoint, b: GridPoint },
    #[error("interior node {node} at {representative} has no lower neighbour")]
    NoOutflow {
        node: NodeId,
        representative: GridPoint,
    },
}

/// Every loaded cell belongs to exactly one node and every node cell is loaded.
pub fn check_partition(graph: &WatershedGraph, heights: &HeightField) -> Result<(), VerifyError> {
    let segments: Vec<SegmentId> = heights.active_segments().collect();
    segments.par_iter().try_for_each(|segment| {
        for point in heights.points_in(*segment) {
            let Some(owner) = graph.owner(point) else {
                return Err(VerifyError::Unowned { point });
            };
            let owns = graph
                .get(owner)
                .map(|node| node.contains(point))
                .unwrap_or(false);
            if !owns {
                return Err(VerifyError::OwnerMismatch {
                    point,
                    node: owner,
                    owner: Some(owner),
                });
            }
        }
        Ok(())
    })?;

    graph.node_map().par_iter().try_for_each(|(id, node)| {
        for point in node.points() {
            if !heights.is_loaded(*point) {
                return Err(VerifyError::UnloadedCell {
                    point: *point,
                    node: *id,
                });
            }
            let owner = graph.owner_map().get(point).copied();
            if owner != Some(*id) {
                return Err(VerifyError::OwnerMismatch {
                    point: *point,
                    node: *id,
                    owner,
                });
            }
        }
        Ok(())
    })?;

    if graph.cell_count() != heights.cell_count() {
        return Err(VerifyError::CellCount {
            owned: graph.cell_count(),
            loaded: heights.cell_count(),
        });
    }
    Ok(())
}

/// Adjacency is symmetric, free of self edges and only names live nodes.
pub fn check_symmetry(graph: &WatershedGraph) -> Result<(), VerifyError> {
    graph.node_map().par_iter().try_for_each(|(id, node)| {
        for neighbor in node.neighbors() {
            if neighbor == id {
                return Err(VerifyError::SelfEdge { node: *id });
            }
            let Some(other) = graph.get(*neighbor) else {
                return Err(VerifyError::DanglingNeighbor {
                    node: *id,
                    neighbor: *neighbor,
                });
            };
            if !other.neighbors().contains(id) {
                return Err(VerifyError::Asymmetric {
                    node: *id,
                    neighbor: *neighbor,
                });
            }
        }
        Ok(())
    })
}

/// Nodes are flat, equal-height neighbours share a node and differing
/// neighbours are connected.
pub fn check_equal_height_merge(
    graph: &WatershedGraph,
    heights: &HeightField,
) -> Result<(), VerifyError> {
    graph.node_map().par_iter().try_for_each(|(id, node)| {
        for point in node.points() {
            let Some(found) = heights.get(*point) else {
                return Err(VerifyError::UnloadedCell {
                    point: *point,
                    node: *id,
                });
            };
            if found != node.height() {
                return Err(VerifyError::HeightMismatch {
                    point: *point,
                    node: *id,
                    expected: node.height(),
                    found,
                });
            }
            for neighbor in point.neighbors() {
                let Some(other_height) = heights.get(neighbor) else {
                    continue;
                };
                let Some(other) = graph.owner(neighbor) else {
                    return Err(VerifyError::Unowned { point: neighbor });
                };
                if other == *id {
                    continue;
                }
                if other_height == found {
                    return Err(VerifyError::UnmergedEqualHeight {
                        a: *point,
                        b: neighbor,
                    });
                }
                if !node.neighbors().contains(&other) {
                    return Err(VerifyError::MissingEdge {
                        a: *point,
                        b: neighbor,
                    });
                }
            }
        }
        Ok(())
    })
}

/// Every interior node has a strictly lower neighbour.
pub fn check_flooded(graph: &WatershedGraph, heights: &HeightField) -> Result<(), VerifyError> {
    graph.node_map().par_iter().try_for_each(|(id, node)| {
        let drains = node
            .neighbors()
            .iter()
            .any(|neighbor| graph.height(*neighbor) < node.height());
        if drains || node_touches_boundary(graph, heights, *id) {
            Ok(())
        } else {
            Err(VerifyError::NoOutflow {
                node: *id,
                representative: node.representative(),
            })
        }
    })
}

pub fn verify_all(graph: &WatershedGraph, heights: &HeightField) -> Result<(), VerifyError> {
    check_symmetry(graph)?;
    check_partition(graph, heights)?;
    check_equal_height_merge(graph, heights)?;
    check_flooded(graph, heights)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        flood::fill_all,
        grid::GridExtent,
        ingest::ingest_segment,
    };

    fn p(row: i64, col: i64) -> GridPoint {
        GridPoint::new(row, col)
    }

    fn pit_field() -> HeightField {
        let mut heights = HeightField::new(3, GridExtent::new(3, 3));
        heights.insert_tile(SegmentId::new(0, 0), vec![5, 5, 5, 5, 1, 4, 5, 5, 5]);
        heights
    }

    #[test]
    fn ingested_and_flooded_graph_passes() {
        let mut heights = pit_field();
        let mut graph = WatershedGraph::new();
        ingest_segment(&mut graph, &heights, SegmentId::new(0, 0));
        fill_all(&mut graph, &mut heights);
        assert_eq!(verify_all(&graph, &heights), Ok(()));
    }

    #[test]
    fn unflooded_pit_has_no_outflow() {
        let heights = pit_field();
        let mut graph = WatershedGraph::new();
        ingest_segment(&mut graph, &heights, SegmentId::new(0, 0));
        let pit = graph.owner(p(1, 1)).unwrap();
        assert_eq!(
            check_flooded(&graph, &heights),
            Err(VerifyError::NoOutflow {
                node: pit,
                representative: p(1, 1)
            })
        );
    }

    #[test]
    fn missing_nodes_break_the_partition() {
        let heights = pit_field();
        let graph = WatershedGraph::new();
        assert!(matches!(
            check_partition(&graph, &heights),
            Err(VerifyError::Unowned { .. })
        ));
    }

    #[test]
    fn hand_built_graph_without_merge_or_edges_is_rejected() {
        let mut heights = HeightField::new(2, GridExtent::new(1, 2));
        heights.insert_tile(SegmentId::new(0, 0), vec![3, 3]);
        let mut graph = WatershedGraph::new();
        graph.insert(vec![p(0, 0)], 3);
        graph.insert(vec![p(0, 1)], 3);
        assert_eq!(check_partition(&graph, &heights), Ok(()));
        assert_eq!(
            check_equal_height_merge(&graph, &heights),
            Err(VerifyError::UnmergedEqualHeight {
                a: p(0, 0),
                b: p(0, 1)
            })
        );

        let mut heights = HeightField::new(2, GridExtent::new(1, 2));
        heights.insert_tile(SegmentId::new(0, 0), vec![3, 2]);
        let mut graph = WatershedGraph::new();
        graph.insert(vec![p(0, 0)], 3);
        graph.insert(vec![p(0, 1)], 2);
        assert_eq!(
            check_equal_height_merge(&graph, &heights),
            Err(VerifyError::MissingEdge {
                a: p(0, 0),
                b: p(0, 1)
            })
        );
    }
}
