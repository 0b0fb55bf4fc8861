//! Replay Demo
//!
//! Walks a simulated position along a short route and prints the nearest
//! waypoint and bearing on every tick.
//!
//! Usage: replay_demo [route.gpx]
//!
//! Without an argument a built-in three-point route is used. The satellite
//! fix is dropped halfway through to show the network source taking over.

use route_pilot::display::format_result;
use route_pilot::*;
use std::sync::Arc;
use std::time::Duration;

const DEMO_ROUTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="route_pilot replay_demo">
  <rte>
    <name>Harbour Walk</name>
    <rtept lat="60.1" lon="24.9"></rtept>
    <rtept lat="60.2" lon="25.0"></rtept>
    <rtept lat="60.3" lon="25.1"></rtept>
  </rte>
</gpx>"#;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging(false)?;

    let route_text = Arc::new(SharedRouteText::new());
    match std::env::args().nth(1) {
        Some(path) => route_text.set(std::fs::read_to_string(&path)?),
        None => route_text.set(DEMO_ROUTE),
    }

    let fixes = vec![
        PositionReading::new(SourceKind::Satellite, 60.08, 24.88, 4.0),
        PositionReading::new(SourceKind::Network, 60.10, 24.95, 40.0),
        PositionReading::new(SourceKind::Satellite, 60.14, 24.94, 4.0),
        PositionReading::new(SourceKind::Satellite, 60.19, 24.99, 6.0),
        PositionReading::new(SourceKind::Network, 60.24, 25.04, 35.0),
        PositionReading::new(SourceKind::Satellite, 60.28, 25.08, 5.0),
    ];

    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    let network = Arc::new(CachedPositionSource::new(SourceKind::Network));
    let location = LocationService::new(PermissionGate::granted())
        .with_source(gps.clone())
        .with_source(network.clone());

    let config = TrackerConfig::default()
        .with_poll_interval(Duration::from_millis(250))
        .with_accuracy_preference(AccuracyPreference::SmallerValue);

    let tracker = TrackingLoop::new(config, route_text, location);
    let mut results = tracker.subscribe();

    let mut replayer = FixReplayer::new(fixes)
        .with_source(gps.clone())
        .with_source(network);

    tracker.start();
    while replayer.feed_next().is_some() {
        if replayer.remaining() == 3 {
            println!("-- satellite fix lost --");
            gps.clear();
        }
        results.changed().await?;
        println!("{}", format_result(results.borrow().as_ref()));
    }

    tracker.stop().await;
    println!("Done after {} ticks", tracker.tick_count());
    Ok(())
}
