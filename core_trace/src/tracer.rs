//! Greedy steepest-descent walk over the watershed graph.
//!
//! The tracer is a small state machine. While WALKING it steps from the
//! current node to its lowest strictly lower neighbour. Whenever the current
//! node borders a segment that is inside the raster but not loaded yet it
//! switches to EXPANDING, loads those segments and re-resolves the recorded
//! path against the merged graph before walking on. The walk ends FINISHED
//! once it has passed its closest approach to the destination, or FAILED when
//! the step budget runs out or the water leaves the raster far from the
//! destination.

use serde::Serialize;
use thiserror::Error;

use crate::{
    config::{TraceConfig, TraceConfigError},
    expansion::WatershedMap,
    graph::{NodeId, WatershedGraph},
    grid::{GridExtent, GridPoint, Height},
    hashing::fingerprint_path,
    metrics::TraceMetrics,
    profile::PathProfile,
    projection::GridProjection,
    raster::{RasterError, RasterSource},
    router::{PathRouter, TracedPoint},
    verify::VerifyError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceState {
    Walking,
    Expanding,
    Finished,
    Failed,
}

/// How a trace ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceStatus {
    /// The walk passed its closest approach to the destination.
    Finished,
    /// The step budget ran out.
    NoPathFound { steps: u32 },
    /// The water drained off the raster before getting near the destination.
    ReachedRasterEdge { at: GridPoint },
}

impl TraceStatus {
    pub fn state(&self) -> TraceState {
        match self {
            TraceStatus::Finished => TraceState::Finished,
            TraceStatus::NoPathFound { .. } | TraceStatus::ReachedRasterEdge { .. } => {
                TraceState::Failed
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, TraceStatus::Finished)
    }
}

#[derive(Debug, Error)]
pub enum TraceError {
    #[error(transparent)]
    Raster(#[from] RasterError),
    #[error("invariant scan failed: {0}")]
    Verification(#[from] VerifyError),
    #[error(transparent)]
    Config(#[from] TraceConfigError),
    #[error("{point} lies outside raster {extent}")]
    OutsideRaster { point: GridPoint, extent: GridExtent },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub id: NodeId,
    pub representative: GridPoint,
    pub height: Height,
    pub cells: usize,
    /// Manhattan distance from the node's closest cell to the destination.
    pub distance: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceReport {
    pub start: GridPoint,
    pub destination: GridPoint,
    pub status: TraceStatus,
    pub nodes: Vec<NodeSummary>,
    pub points: Vec<TracedPoint>,
    pub profile: PathProfile,
    /// WALKING evaluations that moved to a neighbour or ended the walk.
    pub steps: u32,
    pub expansions: u32,
    pub metrics: TraceMetrics,
    pub fingerprint: u64,
}

impl TraceReport {
    pub fn is_finished(&self) -> bool {
        self.status.is_finished()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.iter().map(|node| node.id)
    }
}

enum Transition {
    To(TraceState),
    Stop(TraceStatus),
}

/// Traces flow paths over a raster, loading it segment by segment.
///
/// Loaded segments and the graph persist across calls to [`FlowTracer::trace`],
/// so later traces over the same area reuse earlier work.
pub struct FlowTracer<'a, S: RasterSource + ?Sized> {
    source: &'a mut S,
    config: TraceConfig,
    map: WatershedMap,
    router: PathRouter,
}

impl<'a, S: RasterSource + ?Sized> FlowTracer<'a, S> {
    pub fn new(source: &'a mut S, config: TraceConfig) -> Result<Self, TraceError> {
        config.validate()?;
        let map = WatershedMap::new(config.grid_size, source.extent())
            .with_verification(config.verify);
        Ok(Self {
            source,
            config,
            map,
            router: PathRouter::new(),
        })
    }

    pub fn config(&self) -> &TraceConfig {
        &self.config
    }

    pub fn map(&self) -> &WatershedMap {
        &self.map
    }

    pub fn router(&self) -> &PathRouter {
        &self.router
    }

    /// Project both endpoints onto the grid and trace between them.
    pub fn trace_geographic<P>(
        &mut self,
        projection: &P,
        start: (f64, f64),
        destination: (f64, f64),
    ) -> Result<TraceReport, TraceError>
    where
        P: GridProjection + ?Sized,
    {
        let start = projection.to_grid(start.0, start.1);
        let destination = projection.to_grid(destination.0, destination.1);
        self.trace(start, destination)
    }

    pub fn trace(
        &mut self,
        start: GridPoint,
        destination: GridPoint,
    ) -> Result<TraceReport, TraceError> {
        let extent = self.map.extent();
        for point in [start, destination] {
            if !extent.contains(point) {
                return Err(TraceError::OutsideRaster { point, extent });
            }
        }

        let start_segment = self.map.heights().segment_of(start);
        self.map.load_segment(&mut *self.source, start_segment)?;
        let Some(start_node) = self.map.owner(start) else {
            panic!("start cell {start} is not owned after loading {start_segment}");
        };

        tracing::info!(
            target: "river_trace::tracer",
            %start,
            %destination,
            grid_size = self.config.grid_size,
            "trace.started"
        );

        let mut walk = Walk::new(destination, self.config.finish_radius);
        let mut steps = 0u32;
        let mut expansions = 0u32;
        let mut state = TraceState::Walking;
        let status = if walk.push(self.map.graph(), start, start_node) {
            TraceStatus::Finished
        } else {
            loop {
                let transition = match state {
                    TraceState::Walking => self.walk_once(&mut walk, &mut steps),
                    TraceState::Expanding => {
                        let current = walk.current();
                        let loaded = self.map.expand_around(&mut *self.source, current)?;
                        expansions += 1;
                        self.map.metrics_mut().expansions += 1;
                        tracing::debug!(
                            target: "river_trace::tracer",
                            node = %current,
                            segments = loaded,
                            expansions,
                            "trace.expanded"
                        );
                        if walk.resolve(self.map.graph()) {
                            Transition::Stop(TraceStatus::Finished)
                        } else {
                            Transition::To(TraceState::Walking)
                        }
                    }
                    TraceState::Finished | TraceState::Failed => {
                        unreachable!("trace loop entered terminal state {state:?}")
                    }
                };
                match transition {
                    Transition::To(next) => {
                        tracing::trace!(
                            target: "river_trace::tracer",
                            from = ?state,
                            to = ?next,
                            "trace.transition"
                        );
                        state = next;
                    }
                    Transition::Stop(status) => break status,
                }
            }
        };

        Ok(self.report(start, destination, status, &walk, steps, expansions))
    }

    fn walk_once(&mut self, walk: &mut Walk, steps: &mut u32) -> Transition {
        let current = walk.current();
        if !self.map.segments_to_expand(current).is_empty() {
            return Transition::To(TraceState::Expanding);
        }
        if *steps >= self.config.max_steps {
            return Transition::Stop(TraceStatus::NoPathFound { steps: *steps });
        }
        *steps += 1;
        self.map.metrics_mut().walking_steps += 1;

        let graph = self.map.graph();
        let height = graph.height(current);
        let lowest = graph
            .neighbors(current)
            .iter()
            .copied()
            .min_by(|a, b| graph.height_key_cmp(*a, *b))
            .filter(|next| graph.height(*next) < height);

        match lowest {
            Some(next) => {
                let anchor = graph.node(next).representative();
                if walk.push(graph, anchor, next) {
                    Transition::Stop(TraceStatus::Finished)
                } else {
                    Transition::To(TraceState::Walking)
                }
            }
            None => {
                let at = graph.node(current).representative();
                assert!(
                    self.map.node_touches_boundary(current),
                    "interior node {current} at {at} has no lower neighbour"
                );
                // Every missing neighbour is off-raster: the water leaves here.
                if walk.finish_at_best() {
                    Transition::Stop(TraceStatus::Finished)
                } else {
                    Transition::Stop(TraceStatus::ReachedRasterEdge { at })
                }
            }
        }
    }

    fn report(
        &mut self,
        start: GridPoint,
        destination: GridPoint,
        status: TraceStatus,
        walk: &Walk,
        steps: u32,
        expansions: u32,
    ) -> TraceReport {
        let mut routing = TraceMetrics::default();
        let points = self.router.route(
            self.map.graph(),
            self.map.heights(),
            &walk.nodes,
            start,
            destination,
            &mut routing,
        );
        let metrics = self.map.metrics_mut();
        metrics.router_cache_hits += routing.router_cache_hits;
        metrics.router_cache_misses += routing.router_cache_misses;
        let metrics = *metrics;

        let graph = self.map.graph();
        let nodes = walk
            .nodes
            .iter()
            .zip(&walk.distances)
            .map(|(id, distance)| {
                let node = graph.node(*id);
                NodeSummary {
                    id: *id,
                    representative: node.representative(),
                    height: node.height(),
                    cells: node.len(),
                    distance: *distance,
                }
            })
            .collect();
        let profile = PathProfile::from_points(&points, self.config.cell_size_m);
        let fingerprint = fingerprint_path(points.iter().map(|traced| (&traced.point, traced.height)));

        match status {
            TraceStatus::Finished => tracing::info!(
                target: "river_trace::tracer",
                steps,
                expansions,
                nodes = walk.nodes.len(),
                points = points.len(),
                length_m = profile.length_m,
                "trace.finished"
            ),
            ref failed => tracing::warn!(
                target: "river_trace::tracer",
                status = ?failed,
                steps,
                expansions,
                nodes = walk.nodes.len(),
                "trace.failed"
            ),
        }
        metrics.log();

        TraceReport {
            start,
            destination,
            status,
            nodes,
            points,
            profile,
            steps,
            expansions,
            metrics,
            fingerprint,
        }
    }
}

/// Node path recorded by the walk, with the bookkeeping for finish detection.
#[derive(Debug)]
struct Walk {
    destination: GridPoint,
    finish_radius: u64,
    /// One cell per node; nodes only ever grow, so the current owner of an
    /// anchor is the node that absorbed the recorded one.
    anchors: Vec<GridPoint>,
    nodes: Vec<NodeId>,
    distances: Vec<u64>,
    /// Earliest node with the smallest distance within the finish radius.
    best: Option<usize>,
}

impl Walk {
    fn new(destination: GridPoint, finish_radius: u64) -> Self {
        Self {
            destination,
            finish_radius,
            anchors: Vec::new(),
            nodes: Vec::new(),
            distances: Vec::new(),
            best: None,
        }
    }

    fn current(&self) -> NodeId {
        let Some(current) = self.nodes.last() else {
            panic!("walk lost its start node");
        };
        *current
    }

    /// Append `node`, erasing any loop it closes. Returns `true` when the walk
    /// is finished.
    fn push(&mut self, graph: &WatershedGraph, anchor: GridPoint, node: NodeId) -> bool {
        if let Some(first) = self.nodes.iter().position(|seen| *seen == node) {
            self.truncate(first + 1);
        } else {
            let distance = self.distance_of(graph, node);
            self.anchors.push(anchor);
            self.nodes.push(node);
            self.distances.push(distance);
            let index = self.nodes.len() - 1;
            let improves = match self.best {
                Some(best) => distance < self.distances[best],
                None => true,
            };
            if distance <= self.finish_radius && improves {
                self.best = Some(index);
            }
        }
        self.check_finished()
    }

    /// Map every anchor to its current owner after the graph was merged.
    fn resolve(&mut self, graph: &WatershedGraph) -> bool {
        let anchors = std::mem::take(&mut self.anchors);
        self.nodes.clear();
        self.distances.clear();
        self.best = None;
        let mut finished = false;
        for anchor in anchors {
            let Some(owner) = graph.owner(anchor) else {
                panic!("path cell {anchor} lost its owner");
            };
            finished = self.push(graph, anchor, owner);
            if finished {
                break;
            }
        }
        finished
    }

    /// End the walk at the best candidate, if there is one.
    fn finish_at_best(&mut self) -> bool {
        match self.best {
            Some(best) => {
                self.truncate(best + 1);
                true
            }
            None => false,
        }
    }

    fn check_finished(&mut self) -> bool {
        let Some(best) = self.best else {
            return false;
        };
        let last = self.distances.len() - 1;
        if self.distances[best] == 0 || self.distances[last] > self.distances[best] {
            self.truncate(best + 1);
            return true;
        }
        false
    }

    fn truncate(&mut self, len: usize) {
        self.anchors.truncate(len);
        self.nodes.truncate(len);
        self.distances.truncate(len);
        if self.best.is_some_and(|best| best >= len) {
            self.best = self
                .distances
                .iter()
                .enumerate()
                .filter(|(_, distance)| **distance <= self.finish_radius)
                .min_by_key(|(index, distance)| (**distance, *index))
                .map(|(index, _)| index);
        }
    }

    fn distance_of(&self, graph: &WatershedGraph, node: NodeId) -> u64 {
        graph
            .node(node)
            .points()
            .iter()
            .map(|point| point.manhattan_to(self.destination))
            .min()
            .unwrap_or(u64::MAX)
    }
}
