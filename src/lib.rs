//! Route Pilot Library
//!
//! A Rust library for following a GPX route: it parses route files into
//! ordered waypoints, fuses readings from several positioning sources into
//! one current position, and on a fixed cadence reports the nearest
//! waypoint and the compass bearing towards it.
//!
//! # Features
//!
//! - **`csv`** (default): CSV result recording and fix-file replay
//! - **`cli`** (default): Build the command-line interface binary
//! - **`json`**: JSON configuration files and JSON-lines result recording
//! - **`serde`**: Enable serialization/deserialization of types
//!
//! # Quick Start
//!
//! Parse a route and find the nearest waypoint:
//! ```rust
//! use route_pilot::{bearing, nearest, parse_route, CurrentPosition};
//!
//! let gpx = r#"<gpx version="1.1" creator="demo">
//!   <rte><name>Harbour loop</name>
//!     <rtept lat="60.1" lon="24.9"></rtept>
//!     <rtept lat="60.2" lon="25.0"></rtept>
//!   </rte>
//! </gpx>"#;
//!
//! let route = parse_route(gpx);
//! let here = CurrentPosition::new(60.19, 24.99);
//! let found = nearest(Some(&here), &route).unwrap();
//! assert_eq!(found.index, 1);
//! let heading = bearing(&here, &route.waypoints[found.index]);
//! assert!((0.0..360.0).contains(&heading));
//! ```
//!
//! Run the tracking loop in the background:
//! ```rust,no_run
//! use route_pilot::*;
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let route_text = Arc::new(FileRouteText::new("route.gpx"));
//! let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
//! let location = LocationService::new(PermissionGate::granted()).with_source(gps.clone());
//!
//! let tracker = TrackingLoop::new(TrackerConfig::default(), route_text, location);
//! tracker.start();
//! gps.update(60.25, 25.05, 5.0);
//! // ...
//! tracker.stop().await;
//! # }
//! ```
//!
//! # Public API
//!
//! ## Parsing
//! - [`parse_route`] - Parse route text, never fails
//! - [`parse_route_bytes`] - Parse shared route bytes
//! - [`parse_route_file`] - Read and parse a route file
//!
//! ## Geometry
//! - [`distance_between`] - Great-circle distance in meters
//! - [`bearing`] - Initial compass bearing in degrees
//! - [`nearest`] - Nearest waypoint to a position
//!
//! ## Positioning
//! - [`PositionSource`] - Trait for positioning sources
//! - [`CachedPositionSource`] - Source holding a last-known reading
//! - [`PermissionGate`] - Shared location permission state
//! - [`LocationService`] - Snapshot of all sources
//! - [`fuse`] - Pick the current position from readings
//!
//! ## Tracking
//! - [`TrackingLoop`] - Background nearest-waypoint tracker
//! - [`RouteTextSource`] - Trait for route text suppliers
//! - [`ResultSink`] - Trait for tick result consumers
//! - [`TrackerConfig`] - Loop configuration

// Module declarations
pub mod config;
pub mod display;
pub mod error;
pub mod export;
pub mod fusion;
pub mod geo;
pub mod logging;
pub mod nearest;
pub mod parser;
pub mod replay;
pub mod tracker;
pub mod types;

pub use config::*;
pub use error::*;
pub use export::*;
pub use fusion::*;
pub use geo::*;
pub use nearest::*;
pub use parser::*;
pub use replay::*;
pub use tracker::*;
pub use types::*;
