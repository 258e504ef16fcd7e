mod common;

use core_trace::{load_trace_config_from_env, TraceConfig, TraceConfigSource};

#[test]
fn env_override_is_loaded() {
    let path = common::ensure_test_config();
    let (config, source) = load_trace_config_from_env();
    assert_eq!(source, TraceConfigSource::File(path));
    assert_eq!(config.grid_size, 32);
    assert_eq!(config.finish_radius, 4);
    assert!(config.verify);
    assert_eq!(config.cell_size_m, TraceConfig::default().cell_size_m);
}
