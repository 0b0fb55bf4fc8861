//! Plain-text rendering for console output

use crate::tracker::ResultSink;
use crate::types::{CurrentPosition, TrackingResult};

/// Shown when no position is available
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// Shown when no route text has been provided
pub const NO_SHARED_TEXT: &str = "No shared text";

/// Render a position as two labelled lines
pub fn format_location(position: Option<&CurrentPosition>) -> String {
    match position {
        Some(p) => format!("Latitude: {}\nLongitude: {}", p.latitude, p.longitude),
        None => UNKNOWN_LOCATION.to_string(),
    }
}

/// Render the shared route text, or a placeholder when there is none
pub fn format_route_text(text: Option<&str>) -> String {
    text.unwrap_or(NO_SHARED_TEXT).to_string()
}

/// One-line summary of a tick result
pub fn format_result(result: Option<&TrackingResult>) -> String {
    match result {
        Some(r) => format!(
            "#{:<4} {} -> waypoint {} | {:.1} m | bearing {:.1}°",
            r.tick,
            r.route_name.as_deref().unwrap_or("(unnamed route)"),
            r.waypoint_index,
            r.distance_m,
            r.bearing_deg
        ),
        None => format!("{} / no route waypoint", UNKNOWN_LOCATION),
    }
}

/// Prints each result to stdout
pub struct ConsoleSink;

impl ResultSink for ConsoleSink {
    fn publish(&self, result: Option<&TrackingResult>) {
        println!("{}", format_result(result));
    }
}
