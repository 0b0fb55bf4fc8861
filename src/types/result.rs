use super::CurrentPosition;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output of one tracking tick
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackingResult {
    /// Sequence number of the tick that produced this result, starting at 1
    pub tick: u64,
    /// Index into the route's waypoint list
    pub waypoint_index: usize,
    /// Great-circle distance to the waypoint in meters
    pub distance_m: f64,
    /// Initial bearing to the waypoint in degrees, `[0, 360)`
    pub bearing_deg: f64,
    pub position: CurrentPosition,
    pub route_name: Option<String>,
}
