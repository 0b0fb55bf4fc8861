//! Great-circle geometry on a spherical Earth
//!
//! Distances use the haversine formula; bearings use the standard
//! initial-bearing (forward azimuth) formula. Both accept longitudes outside
//! `[-180, 180]`, so `179.9` and `-180.1` describe the same meridian.

use crate::types::LatLon;

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Bearing returned when the two points coincide (or are antipodal) and no
/// direction is defined
pub const DEGENERATE_BEARING: f64 = 0.0;

const DEGENERATE_EPSILON: f64 = 1e-12;

/// Great-circle distance between two points in meters
pub fn distance_between<A: LatLon + ?Sized, B: LatLon + ?Sized>(from: &A, to: &B) -> f64 {
    haversine_distance(
        from.latitude(),
        from.longitude(),
        to.latitude(),
        to.longitude(),
    )
}

/// Initial compass bearing from `from` to `to` in degrees, `[0, 360)`
///
/// 0 is north, 90 is east. Coincident points return [`DEGENERATE_BEARING`].
pub fn bearing<A: LatLon + ?Sized, B: LatLon + ?Sized>(from: &A, to: &B) -> f64 {
    initial_bearing(
        from.latitude(),
        from.longitude(),
        to.latitude(),
        to.longitude(),
    )
}

/// Haversine distance between two coordinates given in degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);

    // Rounding can push h just past 1.0 for antipodal points
    2.0 * EARTH_RADIUS_M * h.clamp(0.0, 1.0).sqrt().asin()
}

/// Initial bearing between two coordinates given in degrees
pub fn initial_bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let y = d_lambda.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * d_lambda.cos();

    if y.abs() < DEGENERATE_EPSILON && x.abs() < DEGENERATE_EPSILON {
        return DEGENERATE_BEARING;
    }

    normalize_bearing(y.atan2(x).to_degrees())
}

/// Fold any angle in degrees into `[0, 360)`
pub fn normalize_bearing(degrees: f64) -> f64 {
    let folded = degrees.rem_euclid(360.0);
    // rem_euclid of a tiny negative value rounds up to exactly 360.0
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}
