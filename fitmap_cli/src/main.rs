use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};
use fitmap::geo::mps_to_kmh;
use fitmap::{
    parse_max_speed, process, process_multiple, scan_records, track_name, MapOutput,
    MultiOutputs, Params, RawRecord, SingleOutputs,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "FIT to CSV and speed-colored map converter", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one FIT file into a CSV table plus street and satellite maps
    Map(MapArgs),
    /// Draw several FIT files on shared maps, one toggle-able layer per file
    Multi(MultiArgs),
    /// Inspect FIT files for GPS field coverage
    Diagnose(DiagnoseArgs),
}

#[derive(Args, Debug)]
struct MapArgs {
    /// FIT file to convert
    #[arg(value_hint = ValueHint::FilePath)]
    input: PathBuf,

    /// Output folder; files land in `<out-dir>/<name>/`
    #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath)]
    out_dir: PathBuf,

    /// CSV path (overrides the folder layout)
    #[arg(long, value_hint = ValueHint::FilePath)]
    csv: Option<PathBuf>,

    /// Street map HTML path
    #[arg(long, value_hint = ValueHint::FilePath)]
    street: Option<PathBuf>,

    /// Satellite map HTML path
    #[arg(long, value_hint = ValueHint::FilePath)]
    satellite: Option<PathBuf>,

    /// Additional map offering both basemaps
    #[arg(long, value_hint = ValueHint::FilePath)]
    combined: Option<PathBuf>,

    /// Only write the CSV
    #[arg(long, action = ArgAction::SetTrue)]
    no_maps: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct MultiArgs {
    /// FIT files to draw together
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output folder for per-track CSVs and the maps
    #[arg(short, long, default_value = ".", value_hint = ValueHint::DirPath)]
    out_dir: PathBuf,

    /// Street map HTML path (defaults to `<out-dir>/tracks_street.html`)
    #[arg(long, value_hint = ValueHint::FilePath)]
    street: Option<PathBuf>,

    /// Satellite map HTML path (defaults to `<out-dir>/tracks_satellite.html`)
    #[arg(long, value_hint = ValueHint::FilePath)]
    satellite: Option<PathBuf>,

    /// Additional map offering both basemaps
    #[arg(long, value_hint = ValueHint::FilePath)]
    combined: Option<PathBuf>,

    /// Leave out the "toggle all" checkbox
    #[arg(long, action = ArgAction::SetTrue)]
    no_toggle_all: bool,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Debug)]
struct CommonArgs {
    /// Speed ceiling for the color scale (km/h); faster points are still drawn
    #[arg(long, value_parser = parse_speed_arg)]
    max_speed: Option<f64>,

    /// JSON file with map parameters
    #[arg(long, value_hint = ValueHint::FilePath)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct DiagnoseArgs {
    /// FIT files to inspect
    #[arg(required = true, value_hint = ValueHint::FilePath)]
    inputs: Vec<PathBuf>,

    /// Output report path
    #[arg(short, long, default_value = "fit_diagnostics.txt", value_hint = ValueHint::FilePath)]
    output: PathBuf,

    /// Verbose logging
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

fn parse_speed_arg(input: &str) -> Result<f64, String> {
    parse_max_speed(input).map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let verbose = match &cli.command {
        Command::Map(args) => args.common.verbose,
        Command::Multi(args) => args.common.verbose,
        Command::Diagnose(args) => args.verbose,
    };
    init_logging(verbose);

    match cli.command {
        Command::Map(args) => handle_map(args),
        Command::Multi(args) => handle_multi(args),
        Command::Diagnose(args) => handle_diagnose(args),
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
    {
        debug!("log subscriber already installed: {err}");
    }
}

fn load_params(common: &CommonArgs) -> Result<Params> {
    let mut params = match common.config.as_ref() {
        Some(path) => Params::from_json_file(path)?,
        None => Params::default(),
    };
    if let Some(max_speed) = common.max_speed {
        params.max_speed = max_speed;
    }
    params.validate()?;
    Ok(params)
}

fn single_outputs(args: &MapArgs) -> SingleOutputs {
    let mut outputs = SingleOutputs::for_input(&args.out_dir, &args.input);
    if let Some(csv) = args.csv.as_ref() {
        outputs.csv = csv.clone();
    }
    if let Some(street) = args.street.as_ref() {
        outputs.maps[0] = MapOutput::street(street);
    }
    if let Some(satellite) = args.satellite.as_ref() {
        outputs.maps[1] = MapOutput::satellite(satellite);
    }
    if args.no_maps {
        outputs.maps.clear();
    } else if let Some(combined) = args.combined.as_ref() {
        outputs.maps.push(MapOutput::combined(combined));
    }
    outputs
}

fn multi_outputs(args: &MultiArgs) -> MultiOutputs {
    let street = args
        .street
        .clone()
        .unwrap_or_else(|| args.out_dir.join("tracks_street.html"));
    let satellite = args
        .satellite
        .clone()
        .unwrap_or_else(|| args.out_dir.join("tracks_satellite.html"));
    let mut maps = vec![MapOutput::street(street), MapOutput::satellite(satellite)];
    if let Some(combined) = args.combined.as_ref() {
        maps.push(MapOutput::combined(combined));
    }
    MultiOutputs {
        csv_dir: args.out_dir.clone(),
        maps,
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}

fn handle_map(args: MapArgs) -> Result<()> {
    let params = load_params(&args.common)?;
    let outputs = single_outputs(&args);
    ensure_parent(&outputs.csv)?;
    for map in &outputs.maps {
        ensure_parent(&map.path)?;
    }

    let summary = process(&args.input, &outputs, &params)
        .with_context(|| format!("failed to process {}", args.input.display()))?;
    info!(
        "{}: {} points, {} segments, speed scale {:.1}-{:.1} km/h",
        track_name(&args.input),
        summary.points,
        summary.segments,
        summary.scale.min,
        summary.scale.max
    );
    Ok(())
}

fn handle_multi(args: MultiArgs) -> Result<()> {
    let mut params = load_params(&args.common)?;
    if args.no_toggle_all {
        params.toggle_all = false;
    }
    let outputs = multi_outputs(&args);
    fs::create_dir_all(&outputs.csv_dir)
        .with_context(|| format!("failed to create {}", outputs.csv_dir.display()))?;
    for map in &outputs.maps {
        ensure_parent(&map.path)?;
    }

    let summary = process_multiple(&args.inputs, &outputs, &params)?;
    for skipped in &summary.skipped {
        debug!("skipped {}: {}", skipped.path.display(), skipped.reason);
    }
    if !summary.skipped.is_empty() {
        warn!(
            "{} of {} files skipped",
            summary.skipped.len(),
            args.inputs.len()
        );
    }
    info!(
        "Mapped {} tracks, speed scale {:.1}-{:.1} km/h",
        summary.tracks.len(),
        summary.scale.min,
        summary.scale.max
    );
    Ok(())
}

#[derive(Default, Clone, Debug, PartialEq)]
struct Coverage {
    records: usize,
    complete: usize,
    timestamp: usize,
    position: usize,
    speed: usize,
    speed_min_kmh: Option<f64>,
    speed_max_kmh: Option<f64>,
    timespan_s: Option<i64>,
}

fn coverage(records: &[RawRecord]) -> Coverage {
    let mut cov = Coverage {
        records: records.len(),
        ..Coverage::default()
    };
    let mut first = None;
    let mut last = None;
    for record in records {
        if record.is_complete() {
            cov.complete += 1;
        }
        if let Some(ts) = record.timestamp {
            cov.timestamp += 1;
            first.get_or_insert(ts);
            last = Some(ts);
        }
        if record.position_lat.is_some() && record.position_long.is_some() {
            cov.position += 1;
        }
        if let Some(speed) = record.speed_mps.map(mps_to_kmh) {
            cov.speed += 1;
            cov.speed_min_kmh = Some(cov.speed_min_kmh.map_or(speed, |m| m.min(speed)));
            cov.speed_max_kmh = Some(cov.speed_max_kmh.map_or(speed, |m| m.max(speed)));
        }
    }
    if let (Some(start), Some(end)) = (first, last) {
        cov.timespan_s = Some((end - start).num_seconds());
    }
    cov
}

fn format_report(path: &Path, cov: &Coverage) -> String {
    let mut report = String::new();
    report.push_str(&format!("FILE: {}\n", path.display()));
    report.push_str(&format!("  records: {}\n", cov.records));
    report.push_str(&format!("  complete: {}\n", cov.complete));
    let mut missing = BTreeMap::new();
    missing.insert("position", cov.records - cov.position);
    missing.insert("speed", cov.records - cov.speed);
    missing.insert("timestamp", cov.records - cov.timestamp);
    report.push_str("  missing:\n");
    for (field, count) in missing {
        report.push_str(&format!("    - {}: {}\n", field, count));
    }
    if let Some(span) = cov.timespan_s {
        report.push_str(&format!("  timespan_s: {}\n", span));
    }
    if let (Some(min), Some(max)) = (cov.speed_min_kmh, cov.speed_max_kmh) {
        report.push_str(&format!("  speed_kmh: min={:.1} max={:.1}\n", min, max));
    }
    report.push('\n');
    report
}

fn handle_diagnose(args: DiagnoseArgs) -> Result<()> {
    let mut report = String::new();

    for path in &args.inputs {
        let data = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let records =
            scan_records(&data).with_context(|| format!("failed to parse {}", path.display()))?;
        let cov = coverage(&records);
        if cov.complete == 0 {
            warn!("{} has no complete GPS records", path.display());
        }
        report.push_str(&format_report(path, &cov));
    }

    fs::write(&args.output, report)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Diagnostic report written: {}", args.output.display());
    Ok(())
}
