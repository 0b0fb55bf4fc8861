//! Integration tests for route tracking
//!
//! Exercises the public API end to end:
//! - Route files parsed from disk
//! - Fusion of competing sources through the location service
//! - The background loop publishing results and stopping cleanly
//! - Permission changes taking effect on the next tick

use route_pilot::*;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const ROUTE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="route_pilot integration tests">
  <rte>
    <name>Test Route</name>
    <rtept lat="60.1" lon="24.9"></rtept>
    <rtept lat="60.2" lon="25.0"></rtept>
    <rtept lat="60.3" lon="25.1"></rtept>
  </rte>
</gpx>"#;

fn write_route(dir: &TempDir, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join("route.gpx");
    fs::write(&path, contents).expect("Failed to write route file");
    path
}

#[test]
fn test_parse_route_file_from_disk() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_route(&temp_dir, ROUTE_GPX);

    let route = parse_route_file(&path).expect("route file should be readable");
    assert_eq!(route.name.as_deref(), Some("Test Route"));
    assert_eq!(
        route.waypoints,
        vec![
            Waypoint::new(60.1, 24.9),
            Waypoint::new(60.2, 25.0),
            Waypoint::new(60.3, 25.1),
        ]
    );
}

#[test]
fn test_unparseable_route_file_yields_empty_route() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_route(&temp_dir, "<gpx><rte><rtept lat=\"abc\"");

    let route = parse_route_file(&path).expect("read should succeed");
    assert!(route.is_empty());
    assert_eq!(route.name, None);
}

#[test]
fn test_end_to_end_tick_from_file_route() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_route(&temp_dir, ROUTE_GPX);

    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    gps.update(60.25, 25.05, 5.0);
    let location = LocationService::new(PermissionGate::granted()).with_source(gps);

    let tracker = TrackingLoop::new(
        TrackerConfig::default(),
        Arc::new(FileRouteText::new(&path)),
        location,
    );

    let result = tracker.tick().expect("tick should produce a result");
    assert_eq!(result.waypoint_index, 2);
    assert!(result.distance_m > 0.0);
    assert!((0.0..360.0).contains(&result.bearing_deg));
    assert_eq!(result.position, CurrentPosition::new(60.25, 25.05));

    let expected = distance_between(&result.position, &Waypoint::new(60.3, 25.1));
    assert!((result.distance_m - expected).abs() < 1e-6);
}

#[test]
fn test_missing_route_file_gives_no_result() {
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    gps.update(60.25, 25.05, 5.0);
    let location = LocationService::new(PermissionGate::granted()).with_source(gps);

    let tracker = TrackingLoop::new(
        TrackerConfig::default(),
        Arc::new(FileRouteText::new("/nonexistent/route.gpx")),
        location,
    );
    assert_eq!(tracker.tick(), None);
}

#[test]
fn test_fusion_across_sources() {
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    let network = Arc::new(CachedPositionSource::new(SourceKind::Network));
    gps.update(60.1, 24.9, 5.0);
    network.update(60.3, 25.1, 50.0);

    let location = LocationService::new(PermissionGate::granted())
        .with_source(gps.clone())
        .with_source(network.clone());

    // Default ranking keeps the larger accuracy figure
    assert_eq!(
        location.current_position(),
        Some(CurrentPosition::new(60.3, 25.1))
    );

    let precise = LocationService::new(PermissionGate::granted())
        .with_source(gps.clone())
        .with_source(network.clone())
        .with_preference(AccuracyPreference::SmallerValue);
    assert_eq!(
        precise.current_position(),
        Some(CurrentPosition::new(60.1, 24.9))
    );

    // Only one source left: it is used regardless of ranking
    network.set_enabled(false);
    assert_eq!(
        location.current_position(),
        Some(CurrentPosition::new(60.1, 24.9))
    );
}

#[test]
fn test_permission_checked_every_tick() {
    let text = Arc::new(SharedRouteText::new());
    text.set(ROUTE_GPX);
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    gps.update(60.2, 25.0, 5.0);

    let permission = PermissionGate::new();
    let location = LocationService::new(permission.clone()).with_source(gps);
    let tracker = TrackingLoop::new(TrackerConfig::default(), text, location);

    assert_eq!(tracker.tick(), None);

    assert_eq!(permission.resolve(false, true), PermissionState::Granted);
    assert_eq!(tracker.tick().map(|r| r.waypoint_index), Some(1));

    permission.deny();
    assert_eq!(tracker.tick(), None);
}

#[test]
fn test_route_text_replaced_between_ticks() {
    let text = Arc::new(SharedRouteText::new());
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    gps.update(60.1, 24.9, 5.0);
    let location = LocationService::new(PermissionGate::granted()).with_source(gps);
    let tracker = TrackingLoop::new(TrackerConfig::default(), text.clone(), location);

    text.set(ROUTE_GPX);
    assert_eq!(tracker.tick().map(|r| r.waypoint_index), Some(0));

    let reversed = r#"<gpx version="1.1" creator="t"><rte><name>Back</name>
        <rtept lat="60.3" lon="25.1"></rtept>
        <rtept lat="60.1" lon="24.9"></rtept>
    </rte></gpx>"#;
    text.set(reversed);
    let result = tracker.tick().expect("tick should produce a result");
    assert_eq!(result.waypoint_index, 1);
    assert_eq!(result.route_name.as_deref(), Some("Back"));

    text.clear();
    assert_eq!(tracker.tick(), None);
}

#[tokio::test]
async fn test_background_loop_publishes_and_stops() {
    let text = Arc::new(SharedRouteText::new());
    text.set(ROUTE_GPX);
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    gps.update(60.25, 25.05, 5.0);
    let location = LocationService::new(PermissionGate::granted()).with_source(gps);

    let config = TrackerConfig::default().with_poll_interval(Duration::from_millis(10));
    let tracker = TrackingLoop::new(config, text, location);
    let mut results = tracker.subscribe();

    assert!(tracker.start());
    tokio::time::timeout(Duration::from_secs(5), results.changed())
        .await
        .expect("a tick should be published")
        .expect("sender should be alive");

    let published = results.borrow().clone().expect("result expected");
    assert_eq!(published.waypoint_index, 2);

    assert!(tracker.stop().await);
    assert_eq!(tracker.state(), LoopState::Idle);

    let ticks = tracker.tick_count();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tracker.tick_count(), ticks, "no ticks after stop");
}

#[cfg(feature = "csv")]
#[tokio::test]
async fn test_csv_sink_records_loop_results() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let csv_path = temp_dir.path().join("out").join("ticks.csv");

    let text = Arc::new(SharedRouteText::new());
    text.set(ROUTE_GPX);
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    gps.update(60.25, 25.05, 5.0);
    let location = LocationService::new(PermissionGate::granted()).with_source(gps);

    let sink = CsvResultSink::create(&csv_path).expect("CSV sink should be created");
    let tracker = TrackingLoop::new(TrackerConfig::default(), text, location)
        .with_sink(Arc::new(sink));

    tracker.tick();
    tracker.tick();

    let content = fs::read_to_string(&csv_path).expect("Failed to read CSV");
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], CSV_HEADER.join(","));
    assert!(lines[1].starts_with("1,2,"));
    assert!(lines[2].starts_with("2,2,"));
    assert!(lines[2].ends_with(",Test Route"));
}

#[cfg(feature = "csv")]
#[test]
fn test_replayed_fixes_drive_ticks() {
    let fixes = read_fixes(
        "source,latitude,longitude,accuracy\n\
         gps,60.1,24.9,5\n\
         network,60.3,25.1,40\n"
            .as_bytes(),
    )
    .expect("fixes should parse");

    let text = Arc::new(SharedRouteText::new());
    text.set(ROUTE_GPX);
    let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
    let network = Arc::new(CachedPositionSource::new(SourceKind::Network));
    let location = LocationService::new(PermissionGate::granted())
        .with_source(gps.clone())
        .with_source(network.clone());
    let config =
        TrackerConfig::default().with_accuracy_preference(AccuracyPreference::SmallerValue);
    let tracker = TrackingLoop::new(config, text, location);

    let mut replayer = FixReplayer::new(fixes)
        .with_source(gps)
        .with_source(network);

    replayer.feed_next();
    assert_eq!(tracker.tick().map(|r| r.waypoint_index), Some(0));

    // The tighter satellite fix still wins over the new network fix
    replayer.feed_next();
    assert_eq!(tracker.tick().map(|r| r.waypoint_index), Some(0));
    assert!(replayer.is_finished());
}
