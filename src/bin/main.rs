//! CLI binary for Route Pilot
//!
//! Follows a GPX route file and prints the nearest waypoint and bearing on
//! every tick, using a static position or a replayed fixes file.

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use route_pilot::display::ConsoleSink;
use route_pilot::logging::init_logging;
use route_pilot::{
    parse_route_file, AccuracyPreference, CachedPositionSource, FileRouteText, FixReplayer,
    LocationService, PermissionGate, SourceKind, TrackerConfig, TrackingLoop,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accuracy assumed for `--at` when none is given (meters)
const DEFAULT_FIX_ACCURACY_M: f64 = 5.0;

fn build_command() -> Command {
    Command::new("Route Pilot")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Track the nearest waypoint of a GPX route and the bearing towards it.")
        .arg(
            Arg::new("route")
                .help("GPX route file (.gpx) to follow")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("at")
                .long("at")
                .help("Static satellite position as LAT,LON[,ACCURACY]")
                .value_name("LAT,LON[,ACC]")
                .allow_hyphen_values(true),
        )
        .arg(
            Arg::new("fixes")
                .long("fixes")
                .help("CSV file of position fixes (source,latitude,longitude,accuracy) replayed one per tick")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("interval-ms")
                .long("interval-ms")
                .help("Milliseconds between ticks (default: 1000)")
                .value_name("MS")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("ticks")
                .long("ticks")
                .help("Stop after this many ticks (default: run until Ctrl-C)")
                .value_name("N")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("prefer-precise")
                .long("prefer-precise")
                .help("When sources compete, prefer the smaller accuracy figure")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .help("JSON tracker configuration file (requires the json feature)")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("csv-out")
                .long("csv-out")
                .help("Record every result to a CSV file")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("json-out")
                .long("json-out")
                .help("Record every result as JSON lines (requires the json feature)")
                .value_name("FILE"),
        )
        .arg(
            Arg::new("deny-permission")
                .long("deny-permission")
                .help("Simulate a denied location permission")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("debug")
                .long("debug")
                .help("Enable debug output")
                .action(clap::ArgAction::SetTrue),
        )
}

/// Parse `LAT,LON[,ACCURACY]`
fn parse_at(value: &str) -> Result<(f64, f64, f64)> {
    let parts: Vec<&str> = value.split(',').map(str::trim).collect();
    if parts.len() < 2 || parts.len() > 3 {
        bail!("Expected LAT,LON[,ACCURACY], got '{}'", value);
    }

    let lat: f64 = parts[0]
        .parse()
        .with_context(|| format!("Invalid latitude '{}'", parts[0]))?;
    let lon: f64 = parts[1]
        .parse()
        .with_context(|| format!("Invalid longitude '{}'", parts[1]))?;
    let accuracy = match parts.get(2) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid accuracy '{}'", raw))?,
        None => DEFAULT_FIX_ACCURACY_M,
    };

    Ok((lat, lon, accuracy))
}

#[cfg(feature = "json")]
fn load_config(path: &Path) -> Result<TrackerConfig> {
    Ok(TrackerConfig::from_json_file(path)?)
}

#[cfg(not(feature = "json"))]
fn load_config(_path: &Path) -> Result<TrackerConfig> {
    bail!("--config requires route-pilot built with the json feature")
}

#[cfg(feature = "csv")]
fn load_fixes(path: &Path) -> Result<Vec<route_pilot::PositionReading>> {
    Ok(route_pilot::read_fixes_file(path)?)
}

#[cfg(not(feature = "csv"))]
fn load_fixes(_path: &Path) -> Result<Vec<route_pilot::PositionReading>> {
    bail!("--fixes requires route-pilot built with the csv feature")
}

#[cfg(feature = "csv")]
fn attach_csv_sink(tracker: TrackingLoop, path: &Path) -> Result<TrackingLoop> {
    let sink = route_pilot::CsvResultSink::create(path)?;
    Ok(tracker.with_sink(Arc::new(sink)))
}

#[cfg(not(feature = "csv"))]
fn attach_csv_sink(_tracker: TrackingLoop, _path: &Path) -> Result<TrackingLoop> {
    bail!("--csv-out requires route-pilot built with the csv feature")
}

#[cfg(feature = "json")]
fn attach_json_sink(tracker: TrackingLoop, path: &Path) -> Result<TrackingLoop> {
    let sink = route_pilot::JsonLinesSink::create(path)?;
    Ok(tracker.with_sink(Arc::new(sink)))
}

#[cfg(not(feature = "json"))]
fn attach_json_sink(_tracker: TrackingLoop, _path: &Path) -> Result<TrackingLoop> {
    bail!("--json-out requires route-pilot built with the json feature")
}

fn resolve_config(matches: &ArgMatches) -> Result<TrackerConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => load_config(Path::new(path))?,
        None => TrackerConfig::default(),
    };

    if let Some(&interval_ms) = matches.get_one::<u64>("interval-ms") {
        config.poll_interval_ms = interval_ms;
    }
    if matches.get_flag("prefer-precise") {
        config.accuracy_preference = AccuracyPreference::SmallerValue;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_command().get_matches();

    let debug = matches.get_flag("debug");
    init_logging(debug)?;
    debug!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
        commit_date = option_env!("VERGEN_GIT_COMMIT_DATE").unwrap_or("unknown"),
        "Route Pilot starting"
    );

    let route_path = matches
        .get_one::<String>("route")
        .map(PathBuf::from)
        .context("Missing route file argument")?;

    if !route_path.exists() {
        eprintln!("Error: Route file does not exist: {route_path:?}");
        std::process::exit(1);
    }

    let config = resolve_config(&matches)?;

    let route = parse_route_file(&route_path)?;
    println!(
        "Route: {} ({} waypoints)",
        route.name.as_deref().unwrap_or("(unnamed)"),
        route.len()
    );
    if route.is_empty() {
        warn!("Route has no usable waypoints; every tick will report an unknown location");
    }

    let permission = PermissionGate::new();
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    let network = Arc::new(CachedPositionSource::new(SourceKind::Network));
    let location = LocationService::new(permission.clone())
        .with_source(gps.clone())
        .with_source(network.clone());

    let mut tracker = TrackingLoop::new(
        config.clone(),
        Arc::new(FileRouteText::new(&route_path)),
        location,
    )
    .with_sink(Arc::new(ConsoleSink));

    if let Some(path) = matches.get_one::<String>("csv-out") {
        tracker = attach_csv_sink(tracker, Path::new(path))?;
    }
    if let Some(path) = matches.get_one::<String>("json-out") {
        tracker = attach_json_sink(tracker, Path::new(path))?;
    }

    if let Some(at) = matches.get_one::<String>("at") {
        let (lat, lon, accuracy) = parse_at(at)?;
        gps.update(lat, lon, accuracy);
    }

    let mut replayer = match matches.get_one::<String>("fixes") {
        Some(path) => {
            let fixes = load_fixes(Path::new(path))?;
            info!(fixes = fixes.len(), "Replaying position fixes");
            let mut replayer = FixReplayer::new(fixes)
                .with_source(gps.clone())
                .with_source(network.clone());
            replayer.feed_next();
            Some(replayer)
        }
        None => None,
    };

    if replayer.is_none() && !matches.contains_id("at") {
        warn!("No --at position or --fixes file given; no position will be available");
    }

    if matches.get_flag("deny-permission") {
        permission.deny();
    } else {
        permission.resolve(true, true);
    }

    let max_ticks = matches.get_one::<u64>("ticks").copied();
    let mut results = tracker.subscribe();
    tracker.start();

    let mut replay_interval = tokio::time::interval(config.poll_interval());
    // The first fix was delivered before starting
    replay_interval.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let replaying = replayer.as_ref().map_or(false, |r| !r.is_finished());

        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, stopping");
                break;
            }

            changed = results.changed() => {
                if changed.is_err() {
                    break;
                }
                if max_ticks.map_or(false, |max| tracker.tick_count() >= max) {
                    break;
                }
            }

            _ = replay_interval.tick(), if replaying => {
                if let Some(replayer) = replayer.as_mut() {
                    replayer.feed_next();
                }
            }
        }
    }

    tracker.stop().await;
    println!("Stopped after {} ticks", tracker.tick_count());

    Ok(())
}
