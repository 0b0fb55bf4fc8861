//! Position sources and fusion
//!
//! Positioning sources are polled for whatever last-known reading they
//! currently cache; nothing here waits for a fresh fix. A [`LocationService`]
//! gathers those snapshots (subject to the [`PermissionGate`]) and
//! [`fuse`] picks one of them as the current position.

use crate::types::{CurrentPosition, PositionReading, SourceKind};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A device positioning source (satellite receiver, network locator, ...)
pub trait PositionSource: Send + Sync {
    /// Which kind of source this is
    fn kind(&self) -> SourceKind;

    /// Whether the source is switched on; disabled sources are never read
    fn is_enabled(&self) -> bool {
        true
    }

    /// The reading this source last produced, if any
    fn last_known(&self) -> Option<PositionReading>;
}

/// Position source backed by a cached last-known reading
///
/// The platform side calls [`update`](Self::update) whenever a new fix
/// arrives; the tracker only ever reads the cached value.
pub struct CachedPositionSource {
    kind: SourceKind,
    enabled: AtomicBool,
    last: RwLock<Option<PositionReading>>,
}

impl CachedPositionSource {
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            enabled: AtomicBool::new(true),
            last: RwLock::new(None),
        }
    }

    /// Store a new last-known fix at the given coordinates
    pub fn update(&self, latitude: f64, longitude: f64, accuracy: f64) {
        let reading = PositionReading::new(self.kind, latitude, longitude, accuracy);
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(reading);
    }

    pub fn clear(&self) {
        *self.last.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

impl PositionSource for CachedPositionSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn last_known(&self) -> Option<PositionReading> {
        *self.last.read().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Access to positioning sources as granted by the user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionState {
    /// Not yet answered
    Ungranted,
    Granted,
    Denied,
}

impl PermissionState {
    fn to_u8(self) -> u8 {
        match self {
            PermissionState::Ungranted => 0,
            PermissionState::Granted => 1,
            PermissionState::Denied => 2,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => PermissionState::Granted,
            2 => PermissionState::Denied,
            _ => PermissionState::Ungranted,
        }
    }
}

/// Process-wide permission state shared between the grant flow and the tracker
///
/// Clones share the same state. The grant may arrive at any time; readers
/// check it again on every snapshot.
#[derive(Debug, Clone)]
pub struct PermissionGate {
    state: Arc<AtomicU8>,
}

impl PermissionGate {
    /// A gate that has not been answered yet
    pub fn new() -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PermissionState::Ungranted.to_u8())),
        }
    }

    /// A gate that is already granted
    pub fn granted() -> Self {
        let gate = Self::new();
        gate.grant();
        gate
    }

    pub fn state(&self) -> PermissionState {
        PermissionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    pub fn is_granted(&self) -> bool {
        self.state() == PermissionState::Granted
    }

    pub fn grant(&self) {
        self.set(PermissionState::Granted);
    }

    pub fn deny(&self) {
        self.set(PermissionState::Denied);
    }

    /// Apply the outcome of a permission request
    ///
    /// Either precise or approximate location access is enough to read
    /// the sources.
    pub fn resolve(&self, fine: bool, coarse: bool) -> PermissionState {
        let state = if fine || coarse {
            PermissionState::Granted
        } else {
            PermissionState::Denied
        };
        self.set(state);
        state
    }

    fn set(&self, state: PermissionState) {
        let previous = PermissionState::from_u8(self.state.swap(state.to_u8(), Ordering::SeqCst));
        if previous != state {
            debug!(?previous, ?state, "Location permission changed");
        }
    }
}

impl Default for PermissionGate {
    fn default() -> Self {
        Self::new()
    }
}

/// How two competing accuracy figures are ranked during fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AccuracyPreference {
    /// Prefer the reading with the larger accuracy figure (legacy behavior)
    #[default]
    LargerValue,
    /// Prefer the reading with the smaller accuracy figure, i.e. the
    /// tighter error estimate
    SmallerValue,
}

/// Pick the current position from the available readings
///
/// Unusable readings are ignored. A single usable reading is taken as-is;
/// among several, the one ranked best by `preference` wins, and on equal
/// accuracy the later reading in the slice wins.
pub fn fuse(readings: &[PositionReading], preference: AccuracyPreference) -> Option<CurrentPosition> {
    let mut best: Option<&PositionReading> = None;

    for reading in readings.iter().filter(|r| r.is_usable()) {
        let replace = match best {
            None => true,
            Some(current) => match preference {
                AccuracyPreference::LargerValue => reading.accuracy >= current.accuracy,
                AccuracyPreference::SmallerValue => reading.accuracy <= current.accuracy,
            },
        };
        if replace {
            best = Some(reading);
        }
    }

    if let Some(chosen) = best {
        trace!(
            source = %chosen.source,
            accuracy = chosen.accuracy,
            candidates = readings.len(),
            "Fused position"
        );
    }

    best.map(CurrentPosition::from)
}

/// Polls the registered sources for a synchronous snapshot of readings
pub struct LocationService {
    sources: Vec<Arc<dyn PositionSource>>,
    permission: PermissionGate,
    preference: AccuracyPreference,
}

impl LocationService {
    pub fn new(permission: PermissionGate) -> Self {
        Self {
            sources: Vec::new(),
            permission,
            preference: AccuracyPreference::default(),
        }
    }

    /// Register a source; sources are polled in registration order
    pub fn with_source(mut self, source: Arc<dyn PositionSource>) -> Self {
        self.sources.push(source);
        self
    }

    pub fn with_preference(mut self, preference: AccuracyPreference) -> Self {
        self.preference = preference;
        self
    }

    pub fn permission(&self) -> &PermissionGate {
        &self.permission
    }

    pub fn preference(&self) -> AccuracyPreference {
        self.preference
    }

    /// Last-known readings from every enabled source
    ///
    /// Without a granted permission nothing is readable and the snapshot is
    /// empty, the same as having no fix at all.
    pub fn snapshot(&self) -> Vec<PositionReading> {
        if !self.permission.is_granted() {
            trace!(state = ?self.permission.state(), "Location permission not granted");
            return Vec::new();
        }

        self.sources
            .iter()
            .filter(|source| source.is_enabled())
            .filter_map(|source| source.last_known())
            .collect()
    }

    /// Fused current position from a fresh snapshot
    pub fn current_position(&self) -> Option<CurrentPosition> {
        fuse(&self.snapshot(), self.preference)
    }
}
