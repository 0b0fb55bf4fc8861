use super::LatLon;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single point on a route
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl Waypoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Check that the coordinates are finite and inside the geographic ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl LatLon for Waypoint {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

/// Ordered waypoints plus an optional route name
///
/// A route is never edited after parsing; new route text produces a new
/// `Route` that replaces the old one. The waypoint list may be empty.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Route {
    pub name: Option<String>,
    pub waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new(name: Option<String>, waypoints: Vec<Waypoint>) -> Self {
        Self { name, waypoints }
    }

    /// The route produced by any parse failure
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waypoint_ranges() {
        assert!(Waypoint::new(60.1, 24.9).is_valid());
        assert!(Waypoint::new(-90.0, 180.0).is_valid());
        assert!(!Waypoint::new(90.5, 0.0).is_valid());
        assert!(!Waypoint::new(0.0, -180.1).is_valid());
        assert!(!Waypoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_empty_route() {
        let route = Route::empty();
        assert!(route.is_empty());
        assert_eq!(route.name, None);
        assert!(route.get(0).is_none());
    }
}
