//! Point-merge graph.
//!
//! Every loaded cell belongs to exactly one node. A node is a flat,
//! 4-connected group of cells (a single cell, an equal-height plateau, or a
//! filled lake) and is identified by a [`NodeId`]; its *key* is the sorted set
//! of cells it owns. Adjacency is kept symmetric by construction: callers can
//! only mutate the graph through [`WatershedGraph::insert`],
//! [`WatershedGraph::connect`], [`WatershedGraph::replace`] and
//! [`WatershedGraph::remove`], each of which updates both directions and the
//! cell -> node lookup together.
//!
//! Inconsistent requests (self edges, unknown nodes, a cell claimed twice) are
//! programmer errors and panic immediately.

use std::{
    cmp::Ordering,
    collections::{BTreeMap, BTreeSet},
    fmt,
};

use ahash::AHashMap;
use serde::Serialize;

use crate::grid::{GridPoint, Height};

/// Stable handle of a node. Ids are never reused; a merge retires the ids of
/// the absorbed nodes and allocates a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct NodeId(u32);

impl NodeId {
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    points: Vec<GridPoint>,
    height: Height,
    neighbors: BTreeSet<NodeId>,
}

impl Node {
    /// Cells of the node, sorted row-major.
    pub fn points(&self) -> &[GridPoint] {
        &self.points
    }

    /// Smallest cell of the node.
    pub fn representative(&self) -> GridPoint {
        self.points[0]
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn neighbors(&self) -> &BTreeSet<NodeId> {
        &self.neighbors
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn contains(&self, point: GridPoint) -> bool {
        self.points.binary_search(&point).is_ok()
    }

    /// Lexicographic order of node keys. Keys are disjoint, so comparing the
    /// representatives decides it.
    pub fn key_cmp(&self, other: &Node) -> Ordering {
        self.points.cmp(&other.points)
    }
}

#[derive(Debug, Clone, Default)]
pub struct WatershedGraph {
    nodes: BTreeMap<NodeId, Node>,
    owners: AHashMap<GridPoint, NodeId>,
    next_id: u32,
    generation: u64,
}

impl PartialEq for WatershedGraph {
    fn eq(&self, other: &Self) -> bool {
        self.next_id == other.next_id && self.nodes == other.nodes
    }
}

impl Eq for WatershedGraph {}

impl WatershedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of cells owned by some node.
    pub fn cell_count(&self) -> usize {
        self.owners.len()
    }

    /// Bumped by every mutation that changes the graph.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// Node lookup for ids the caller knows to be live.
    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes
            .get(&id)
            .unwrap_or_else(|| panic!("unknown node {id}"))
    }

    pub fn neighbors(&self, id: NodeId) -> &BTreeSet<NodeId> {
        self.node(id).neighbors()
    }

    pub fn height(&self, id: NodeId) -> Height {
        self.node(id).height
    }

    /// Current owner of a cell.
    pub fn owner(&self, point: GridPoint) -> Option<NodeId> {
        self.owners.get(&point).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub(crate) fn node_map(&self) -> &BTreeMap<NodeId, Node> {
        &self.nodes
    }

    pub(crate) fn owner_map(&self) -> &AHashMap<GridPoint, NodeId> {
        &self.owners
    }

    /// Compare two nodes by (height, key), the order used for every
    /// deterministic choice between nodes.
    pub fn height_key_cmp(&self, a: NodeId, b: NodeId) -> Ordering {
        let node_a = self.node(a);
        let node_b = self.node(b);
        node_a
            .height
            .cmp(&node_b.height)
            .then_with(|| node_a.key_cmp(node_b))
    }

    /// Add an isolated node owning `points`.
    pub fn insert(&mut self, mut points: Vec<GridPoint>, height: Height) -> NodeId {
        assert!(!points.is_empty(), "a node must own at least one cell");
        points.sort_unstable();
        points.dedup();
        let id = self.allocate_id();
        for point in &points {
            if let Some(existing) = self.owners.insert(*point, id) {
                panic!("cell {point} is already owned by node {existing}");
            }
        }
        self.nodes.insert(
            id,
            Node {
                points,
                height,
                neighbors: BTreeSet::new(),
            },
        );
        self.generation += 1;
        id
    }

    /// Add the undirected edge `a - b`. Returns `false` when it already existed.
    pub fn connect(&mut self, a: NodeId, b: NodeId) -> bool {
        assert_ne!(a, b, "node {a} cannot neighbour itself");
        assert!(self.contains(b), "cannot connect {a} to unknown node {b}");
        let forward = self
            .nodes
            .get_mut(&a)
            .unwrap_or_else(|| panic!("cannot connect unknown node {a} to {b}"))
            .neighbors
            .insert(b);
        let backward = self
            .nodes
            .get_mut(&b)
            .map(|node| node.neighbors.insert(a))
            .unwrap_or(false);
        assert_eq!(
            forward, backward,
            "asymmetric adjacency between {a} and {b}"
        );
        if forward {
            self.generation += 1;
        }
        forward
    }

    /// Delete a node, its edges and its cell ownership.
    pub fn remove(&mut self, id: NodeId) -> Node {
        let node = self
            .nodes
            .remove(&id)
            .unwrap_or_else(|| panic!("cannot remove unknown node {id}"));
        for neighbor in &node.neighbors {
            let removed = self
                .nodes
                .get_mut(neighbor)
                .map(|other| other.neighbors.remove(&id))
                .unwrap_or(false);
            assert!(
                removed,
                "asymmetric adjacency: {neighbor} does not list {id}"
            );
        }
        for point in &node.points {
            let owner = self.owners.remove(point);
            assert_eq!(owner, Some(id), "cell {point} was not owned by {id}");
        }
        self.generation += 1;
        node
    }

    /// Collapse `old` into one new node at `height`.
    ///
    /// The new node owns every cell of the old nodes and neighbours every
    /// external neighbour of them; those neighbours are rewritten to point at
    /// the new node. The stale nodes and their cell ownership are retired
    /// before the new node claims the cells.
    pub fn replace(&mut self, old: &BTreeSet<NodeId>, height: Height) -> NodeId {
        assert!(!old.is_empty(), "replace needs at least one node");
        let mut points = Vec::new();
        let mut external = BTreeSet::new();
        for id in old {
            let node = self
                .nodes
                .remove(id)
                .unwrap_or_else(|| panic!("cannot replace unknown node {id}"));
            external.extend(node.neighbors.into_iter().filter(|n| !old.contains(n)));
            points.extend(node.points);
        }
        for point in &points {
            self.owners.remove(point);
        }

        let id = self.allocate_id();
        for neighbor in &external {
            let other = self
                .nodes
                .get_mut(neighbor)
                .unwrap_or_else(|| panic!("node lists unknown neighbour {neighbor}"));
            let before = other.neighbors.len();
            other.neighbors.retain(|n| !old.contains(n));
            assert!(
                other.neighbors.len() < before,
                "asymmetric adjacency: {neighbor} lists none of the replaced nodes"
            );
            other.neighbors.insert(id);
        }

        points.sort_unstable();
        for point in &points {
            if let Some(existing) = self.owners.insert(*point, id) {
                panic!("cell {point} is already owned by node {existing}");
            }
        }
        self.nodes.insert(
            id,
            Node {
                points,
                height,
                neighbors: external,
            },
        );
        self.generation += 1;
        id
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id = self
            .next_id
            .checked_add(1)
            .expect("node id space exhausted");
        id
    }
}
