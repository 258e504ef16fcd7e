//! Tracer configuration.
//!
//! Loaded from `trace_config.json` with support for an environment variable
//! override.

use std::{
    env, fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BUILTIN_TRACE_CONFIG: &str = include_str!("data/trace_config.json");

/// Environment variable naming a config file to load instead of the builtin.
pub const TRACE_CONFIG_ENV: &str = "RIVER_TRACE_CONFIG_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Edge length of a segment in cells.
    pub grid_size: u32,
    /// WALKING evaluations allowed before the trace gives up.
    pub max_steps: u32,
    /// Manhattan distance under which a node counts as reaching the destination.
    pub finish_radius: u64,
    /// Ground size of one cell, in metres.
    pub cell_size_m: f64,
    /// Run the full invariant scans after every ingestion and flood pass.
    pub verify: bool,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            grid_size: 100,
            max_steps: 10_000,
            finish_radius: 10,
            cell_size_m: 10.0,
            verify: false,
        }
    }
}

impl TraceConfig {
    pub fn builtin() -> Self {
        serde_json::from_str(BUILTIN_TRACE_CONFIG).expect("builtin trace config should parse")
    }

    pub fn from_json_str(json: &str) -> Result<Self, TraceConfigError> {
        let config: TraceConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, TraceConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| TraceConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), TraceConfigError> {
        if self.grid_size == 0 {
            return Err(TraceConfigError::Invalid {
                field: "grid_size",
                reason: "must be at least 1",
            });
        }
        if self.max_steps == 0 {
            return Err(TraceConfigError::Invalid {
                field: "max_steps",
                reason: "must be at least 1",
            });
        }
        if !(self.cell_size_m.is_finite() && self.cell_size_m > 0.0) {
            return Err(TraceConfigError::Invalid {
                field: "cell_size_m",
                reason: "must be a positive number",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum TraceConfigError {
    #[error("failed to parse trace config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read trace config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid trace config: {field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceConfigSource {
    Builtin,
    File(PathBuf),
}

/// Load the configuration named by `RIVER_TRACE_CONFIG_PATH`, falling back to
/// the builtin when the variable is unset or the file cannot be used.
pub fn load_trace_config_from_env() -> (TraceConfig, TraceConfigSource) {
    let Some(path) = env::var_os(TRACE_CONFIG_ENV).map(PathBuf::from) else {
        tracing::info!(target: "river_trace::config", "trace_config.loaded=builtin");
        return (TraceConfig::builtin(), TraceConfigSource::Builtin);
    };

    match TraceConfig::from_file(&path) {
        Ok(config) => {
            tracing::info!(
                target: "river_trace::config",
                path = %path.display(),
                "trace_config.loaded=file"
            );
            (config, TraceConfigSource::File(path))
        }
        Err(err) => {
            tracing::warn!(
                target: "river_trace::config",
                path = %path.display(),
                error = %err,
                "trace_config.load_failed"
            );
            tracing::info!(target: "river_trace::config", "trace_config.loaded=builtin");
            (TraceConfig::builtin(), TraceConfigSource::Builtin)
        }
    }
}
