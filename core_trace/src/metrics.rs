use serde::Serialize;

use crate::{flood::FloodSummary, ingest::IngestSummary};

/// Counters accumulated over the lifetime of one watershed map and its traces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TraceMetrics {
    pub tiles_loaded: u64,
    pub cells_loaded: u64,
    pub equal_height_merges: u64,
    pub lakes_filled: u64,
    pub cells_flooded: u64,
    pub walking_steps: u64,
    pub expansions: u64,
    pub router_cache_hits: u64,
    pub router_cache_misses: u64,
}

impl TraceMetrics {
    pub fn record_ingest(&mut self, summary: IngestSummary) {
        self.tiles_loaded += 1;
        self.cells_loaded += summary.cells as u64;
        self.equal_height_merges += summary.merges as u64;
    }

    pub fn record_flood(&mut self, summary: FloodSummary) {
        self.lakes_filled += summary.lakes as u64;
        self.cells_flooded += summary.cells_flooded as u64;
    }

    /// Share of router lookups answered from the cache.
    pub fn router_hit_rate(&self) -> f64 {
        let total = self.router_cache_hits + self.router_cache_misses;
        if total == 0 {
            0.0
        } else {
            self.router_cache_hits as f64 / total as f64
        }
    }

    pub fn log(&self) {
        tracing::info!(
            target: "river_trace::tracer",
            tiles_loaded = self.tiles_loaded,
            cells_loaded = self.cells_loaded,
            equal_height_merges = self.equal_height_merges,
            lakes_filled = self.lakes_filled,
            cells_flooded = self.cells_flooded,
            walking_steps = self.walking_steps,
            expansions = self.expansions,
            router_cache_hits = self.router_cache_hits,
            router_cache_misses = self.router_cache_misses,
            "trace.metrics"
        );
    }
}
