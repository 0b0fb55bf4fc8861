use super::LatLon;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which positioning source produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SourceKind {
    /// Satellite-based fix (GPS/GNSS)
    Satellite,
    /// Network-based fix (cell towers, Wi-Fi)
    Network,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Satellite => "gps",
            SourceKind::Network => "network",
        }
    }

    /// Parse a source label as used in fix files ("gps", "satellite", "network")
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "gps" | "gnss" | "satellite" => Some(SourceKind::Satellite),
            "network" | "net" => Some(SourceKind::Network),
            _ => None,
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known reading reported by one positioning source
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PositionReading {
    pub latitude: f64,
    pub longitude: f64,
    /// Self-reported error estimate in meters, smaller is more precise
    pub accuracy: f64,
    pub source: SourceKind,
}

impl PositionReading {
    pub fn new(source: SourceKind, latitude: f64, longitude: f64, accuracy: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy,
            source,
        }
    }

    /// A reading takes part in fusion only with finite coordinates and a
    /// finite, non-negative accuracy
    pub fn is_usable(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.accuracy.is_finite()
            && self.accuracy >= 0.0
    }
}

/// Fused best-estimate position for one tick
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurrentPosition {
    pub latitude: f64,
    pub longitude: f64,
}

impl CurrentPosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<&PositionReading> for CurrentPosition {
    fn from(reading: &PositionReading) -> Self {
        Self::new(reading.latitude, reading.longitude)
    }
}

impl LatLon for CurrentPosition {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl LatLon for PositionReading {
    fn latitude(&self) -> f64 {
        self.latitude
    }

    fn longitude(&self) -> f64 {
        self.longitude
    }
}
