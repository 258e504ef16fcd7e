//! Incremental watershed-graph river tracer.
//!
//! Traces a downhill flow path between two cells of an elevation raster that
//! is too large to load at once. The raster is read one segment at a time
//! through a [`RasterSource`]; each loaded segment is merged into a
//! [`WatershedGraph`] of flat cell groups, depressions are filled so every
//! interior node drains, and a [`FlowTracer`] walks the graph by steepest
//! descent, loading more segments whenever the walk reaches the edge of what
//! is loaded. The resulting node path is expanded into cells by the
//! [`PathRouter`].

pub mod config;
pub mod expansion;
pub mod flood;
pub mod graph;
pub mod grid;
pub mod hashing;
pub mod heightfield;
pub mod ingest;
pub mod metrics;
pub mod profile;
pub mod projection;
pub mod raster;
pub mod router;
pub mod synthetic;
pub mod tracer;
pub mod verify;
pub mod watershed;

pub use config::{
    load_trace_config_from_env, TraceConfig, TraceConfigError, TraceConfigSource,
    BUILTIN_TRACE_CONFIG, TRACE_CONFIG_ENV,
};
pub use expansion::WatershedMap;
pub use flood::{fill_all, fill_depressions, FloodSummary};
pub use graph::{Node, NodeId, WatershedGraph};
pub use grid::{GridExtent, GridPoint, Height, RasterWindow, SegmentId, Sides};
pub use hashing::{fingerprint_path, FnvHasher};
pub use heightfield::HeightField;
pub use ingest::{ingest_segment, IngestSummary};
pub use metrics::TraceMetrics;
pub use profile::{PathProfile, ProfileSample};
pub use projection::{AffineProjection, GridProjection};
pub use raster::{InMemoryRaster, RasterError, RasterSource};
pub use router::{PathRouter, TracedPoint};
pub use synthetic::SyntheticTerrain;
pub use tracer::{FlowTracer, NodeSummary, TraceError, TraceReport, TraceState, TraceStatus};
pub use verify::{verify_all, VerifyError};
pub use watershed::accumulate_flow;
