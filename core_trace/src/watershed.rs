//! Flow accumulation over a flooded graph.

use std::collections::BTreeMap;

use crate::graph::{NodeId, WatershedGraph};

/// Route water downhill through every node and report how much passes
/// through each one.
///
/// With `source` unset every node contributes its cell count; otherwise a
/// single unit is released at `source`. Nodes are visited from highest to
/// lowest and each one splits its total among its strictly lower neighbours
/// in proportion to the height drop. Nodes without a lower neighbour (after
/// flooding, only nodes on the loaded boundary) keep what they receive.
pub fn accumulate_flow(graph: &WatershedGraph, source: Option<NodeId>) -> BTreeMap<NodeId, f64> {
    let mut flow: BTreeMap<NodeId, f64> = match source {
        Some(id) => {
            assert!(graph.contains(id), "unknown flow source {id}");
            graph.ids().map(|n| (n, if n == id { 1.0 } else { 0.0 })).collect()
        }
        None => graph.iter().map(|(id, node)| (id, node.len() as f64)).collect(),
    };

    let mut order: Vec<NodeId> = graph.ids().collect();
    order.sort_by(|a, b| graph.height_key_cmp(*b, *a));

    for id in order {
        let total = flow[&id];
        if total == 0.0 {
            continue;
        }
        let height = graph.height(id);
        let drops: Vec<(NodeId, f64)> = graph
            .neighbors(id)
            .iter()
            .filter(|n| graph.height(**n) < height)
            .map(|n| (*n, f64::from(height - graph.height(*n))))
            .collect();
        let fall: f64 = drops.iter().map(|(_, drop)| drop).sum();
        if fall == 0.0 {
            continue;
        }
        for (neighbor, drop) in drops {
            if let Some(value) = flow.get_mut(&neighbor) {
                *value += total * drop / fall;
            }
        }
    }

    tracing::debug!(
        target: "river_trace::flood",
        nodes = flow.len(),
        source = ?source,
        "watershed.accumulated"
    );
    flow
}
