use crate::geo::distance_between;
use crate::types::{CurrentPosition, Route};

/// Closest waypoint found for a position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestWaypoint {
    pub index: usize,
    pub distance_m: f64,
}

/// Find the route waypoint closest to `position`
///
/// Returns `None` when there is no position or the route has no waypoints.
/// When several waypoints share the minimum distance the first one in route
/// order wins, including when that distance is exactly zero.
pub fn nearest(position: Option<&CurrentPosition>, route: &Route) -> Option<NearestWaypoint> {
    let position = position?;
    let mut best: Option<NearestWaypoint> = None;

    for (index, waypoint) in route.waypoints.iter().enumerate() {
        let distance_m = distance_between(position, waypoint);
        let closer = match best {
            None => true,
            Some(current) => distance_m < current.distance_m,
        };
        if closer {
            best = Some(NearestWaypoint { index, distance_m });
        }
    }

    best
}
