use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};
use color_eyre::{eyre::eyre, Result};
use serde::Serialize;
use tracing::info;

use core_trace::{
    accumulate_flow, load_trace_config_from_env, AffineProjection, FlowTracer, GridExtent,
    GridPoint, InMemoryRaster, NodeId, RasterSource, SyntheticTerrain, TraceConfig, TraceReport,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Trace a downhill river path across an elevation raster", long_about = None)]
struct Cli {
    /// JSON elevation grid (an array of equal-length rows). Synthetic terrain is
    /// used when omitted.
    #[arg(long)]
    grid: Option<PathBuf>,
    #[command(flatten)]
    synthetic: SyntheticArgs,
    /// Tracer configuration file. Falls back to `RIVER_TRACE_CONFIG_PATH`, then
    /// the builtin defaults.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    overrides: ConfigOverrides,
    /// Start cell as `row,col`.
    #[arg(long, value_parser = parse_point, required_unless_present = "start_geo")]
    start: Option<GridPoint>,
    /// Destination cell as `row,col`.
    #[arg(long, value_parser = parse_point, required_unless_present = "dest_geo")]
    dest: Option<GridPoint>,
    #[command(flatten)]
    geo: GeoArgs,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
    /// Also report the nodes carrying the most accumulated flow.
    #[arg(long)]
    watershed: bool,
}

#[derive(Args, Debug)]
struct SyntheticArgs {
    #[arg(long, default_value_t = 512)]
    rows: i64,
    #[arg(long, default_value_t = 1024)]
    cols: i64,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Height lost per column; keeps synthetic rivers flowing east.
    #[arg(long, default_value_t = 0.2)]
    tilt: f32,
}

#[derive(Args, Debug)]
struct ConfigOverrides {
    #[arg(long)]
    grid_size: Option<u32>,
    #[arg(long)]
    max_steps: Option<u32>,
    #[arg(long)]
    finish_radius: Option<u64>,
    #[arg(long)]
    cell_size_m: Option<f64>,
    /// Run the full invariant scans after every loaded segment.
    #[arg(long)]
    verify: bool,
}

#[derive(Args, Debug)]
struct GeoArgs {
    /// Start as `lat,lon`; requires `--origin` and `--degrees-per-cell`.
    #[arg(long, value_parser = parse_pair, requires_all = ["origin", "degrees_per_cell"])]
    start_geo: Option<(f64, f64)>,
    /// Destination as `lat,lon`.
    #[arg(long, value_parser = parse_pair, requires_all = ["origin", "degrees_per_cell"])]
    dest_geo: Option<(f64, f64)>,
    /// Latitude/longitude of the centre of cell (0, 0).
    #[arg(long, value_parser = parse_pair)]
    origin: Option<(f64, f64)>,
    #[arg(long)]
    degrees_per_cell: Option<f64>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Serialize)]
struct FlowEntry {
    node: NodeId,
    representative: GridPoint,
    flow: f64,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(&cli)?;

    let mut source: Box<dyn RasterSource> = match &cli.grid {
        Some(path) => {
            info!(target: "river_trace::cli", path = %path.display(), "raster.source=json");
            Box::new(InMemoryRaster::from_file(path)?)
        }
        None => {
            let extent = GridExtent::new(cli.synthetic.rows, cli.synthetic.cols);
            info!(
                target: "river_trace::cli",
                %extent,
                seed = cli.synthetic.seed,
                "raster.source=synthetic"
            );
            Box::new(SyntheticTerrain::new(extent, cli.synthetic.seed).with_tilt(cli.synthetic.tilt))
        }
    };

    let mut tracer = FlowTracer::new(&mut source, config)?;
    let report = match (cli.geo.start_geo, cli.geo.dest_geo) {
        (Some(start), Some(dest)) => {
            let projection = projection(&cli.geo)?;
            tracer.trace_geographic(&projection, start, dest)?
        }
        _ => {
            let start = cli.start.ok_or_else(|| eyre!("--start or --start-geo is required"))?;
            let dest = cli.dest.ok_or_else(|| eyre!("--dest or --dest-geo is required"))?;
            tracer.trace(start, dest)?
        }
    };

    let flows = if cli.watershed {
        let graph = tracer.map().graph();
        let mut flows: Vec<FlowEntry> = accumulate_flow(graph, None)
            .into_iter()
            .map(|(node, flow)| FlowEntry {
                node,
                representative: graph.node(node).representative(),
                flow,
            })
            .collect();
        flows.sort_by(|a, b| b.flow.total_cmp(&a.flow).then(a.node.cmp(&b.node)));
        flows.truncate(5);
        Some(flows)
    } else {
        None
    };

    match cli.format {
        OutputFormat::Json => print_json(&report, flows.as_deref())?,
        OutputFormat::Text => print_text(&report, flows.as_deref()),
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> Result<TraceConfig> {
    let mut config = match &cli.config {
        Some(path) => TraceConfig::from_file(path)?,
        None => load_trace_config_from_env().0,
    };
    let overrides = &cli.overrides;
    if let Some(grid_size) = overrides.grid_size {
        config.grid_size = grid_size;
    }
    if let Some(max_steps) = overrides.max_steps {
        config.max_steps = max_steps;
    }
    if let Some(finish_radius) = overrides.finish_radius {
        config.finish_radius = finish_radius;
    }
    if let Some(cell_size_m) = overrides.cell_size_m {
        config.cell_size_m = cell_size_m;
    }
    config.verify |= overrides.verify;
    config.validate()?;
    Ok(config)
}

fn projection(geo: &GeoArgs) -> Result<AffineProjection> {
    let (lat, lon) = geo
        .origin
        .ok_or_else(|| eyre!("--origin is required for geographic endpoints"))?;
    let degrees = geo
        .degrees_per_cell
        .ok_or_else(|| eyre!("--degrees-per-cell is required for geographic endpoints"))?;
    if !(degrees.is_finite() && degrees > 0.0) {
        return Err(eyre!("--degrees-per-cell must be positive, got {degrees}"));
    }
    Ok(AffineProjection::new(lat, lon, degrees))
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    trace: &'a TraceReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    watershed: Option<&'a [FlowEntry]>,
}

fn print_json(report: &TraceReport, flows: Option<&[FlowEntry]>) -> Result<()> {
    let output = JsonOutput {
        trace: report,
        watershed: flows,
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_text(report: &TraceReport, flows: Option<&[FlowEntry]>) {
    println!("status: {:?}", report.status);
    println!(
        "start {} -> destination {}: {} nodes, {} cells, {} steps, {} expansions",
        report.start,
        report.destination,
        report.nodes.len(),
        report.points.len(),
        report.steps,
        report.expansions
    );
    println!(
        "length {:.1} m, descent {} m, gradient {:.2} m/km",
        report.profile.length_m,
        report.profile.total_descent,
        report.profile.average_gradient_m_per_km
    );
    println!("fingerprint {:016x}", report.fingerprint);
    for traced in &report.points {
        println!("{}\t{}\t{}", traced.point.row, traced.point.col, traced.height);
    }
    if let Some(flows) = flows {
        println!("largest accumulated flows:");
        for entry in flows {
            println!("  {} at {}: {:.1}", entry.node, entry.representative, entry.flow);
        }
    }
}

fn parse_pair(raw: &str) -> Result<(f64, f64), String> {
    let (a, b) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected `a,b`, got `{raw}`"))?;
    let a = a.trim().parse().map_err(|err| format!("bad number `{a}`: {err}"))?;
    let b = b.trim().parse().map_err(|err| format!("bad number `{b}`: {err}"))?;
    Ok((a, b))
}

fn parse_point(raw: &str) -> Result<GridPoint, String> {
    let (row, col) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected `row,col`, got `{raw}`"))?;
    let row = row
        .trim()
        .parse()
        .map_err(|err| format!("bad row `{row}`: {err}"))?;
    let col = col
        .trim()
        .parse()
        .map_err(|err| format!("bad column `{col}`: {err}"))?;
    Ok(GridPoint::new(row, col))
}
