//! Nearest-waypoint tracking loop
//!
//! The [`TrackingLoop`] runs on a background tokio task. On every tick it
//! resolves the current route from a [`RouteTextSource`], fuses the current
//! position from a [`LocationService`], finds the nearest waypoint and the
//! bearing to it, and publishes the result.
//!
//! # Lifecycle
//!
//! The loop starts `Idle`. [`TrackingLoop::start`] moves it to `Running`;
//! calling it again while running does nothing. [`TrackingLoop::stop`]
//! cancels the task, waits for it to finish and returns to `Idle`. A stop
//! takes effect before the next tick begins; a tick already in progress
//! completes. Ticks never overlap.
//!
//! # Example
//!
//! ```ignore
//! let route_text = Arc::new(SharedRouteText::new());
//! let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
//! let location = LocationService::new(PermissionGate::granted()).with_source(gps.clone());
//!
//! let tracker = TrackingLoop::new(TrackerConfig::default(), route_text.clone(), location);
//! let mut results = tracker.subscribe();
//! tracker.start();
//!
//! route_text.set(gpx_text);
//! gps.update(60.25, 25.05, 5.0);
//! results.changed().await?;
//!
//! tracker.stop().await;
//! ```

use crate::config::TrackerConfig;
use crate::fusion::LocationService;
use crate::geo::bearing;
use crate::nearest::nearest;
use crate::parser::parse_route;
use crate::types::{Route, TrackingResult};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Supplier of route text, e.g. a file shared into the application
pub trait RouteTextSource: Send + Sync {
    /// The current route text, or `None` if no route has been provided
    fn route_text(&self) -> Option<Arc<str>>;
}

/// Route text handed in by a collaborator at any time
#[derive(Default)]
pub struct SharedRouteText {
    text: RwLock<Option<Arc<str>>>,
}

impl SharedRouteText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, text: impl Into<Arc<str>>) {
        *self.text.write().unwrap_or_else(PoisonError::into_inner) = Some(text.into());
    }

    pub fn clear(&self) {
        *self.text.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl RouteTextSource for SharedRouteText {
    fn route_text(&self) -> Option<Arc<str>> {
        self.text
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Route text read from a file on every request
///
/// A missing or unreadable file is reported once when it goes away and once
/// when it comes back, not on every request.
pub struct FileRouteText {
    path: PathBuf,
    unavailable: AtomicBool,
}

impl FileRouteText {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            unavailable: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RouteTextSource for FileRouteText {
    fn route_text(&self) -> Option<Arc<str>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => {
                if self.unavailable.swap(false, Ordering::Relaxed) {
                    info!(path = %self.path.display(), "Route file available again");
                }
                Some(text.into())
            }
            Err(e) => {
                if self.unavailable.swap(true, Ordering::Relaxed) {
                    trace!(path = %self.path.display(), error = %e, "Route file still unavailable");
                } else {
                    warn!(path = %self.path.display(), error = %e, "Route file unavailable");
                }
                None
            }
        }
    }
}

/// Parsed route memoised by a hash of its source text
///
/// Readers always get a whole `Route`: the cached entry is replaced under a
/// write lock, never edited in place.
#[derive(Default)]
pub struct RouteCache {
    entry: RwLock<Option<(u64, Arc<Route>)>>,
}

impl RouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route for `text`, parsing only when the text changed since last call
    pub fn resolve(&self, text: Option<&str>) -> Arc<Route> {
        let Some(text) = text else {
            self.invalidate();
            return Arc::new(Route::empty());
        };

        let key = text_hash(text);
        if let Some((cached_key, route)) = self
            .entry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            if *cached_key == key {
                return Arc::clone(route);
            }
        }

        let route = Arc::new(parse_route(text));
        debug!(
            waypoints = route.len(),
            route_name = route.name.as_deref().unwrap_or(""),
            "Route text changed, cache refreshed"
        );
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) =
            Some((key, Arc::clone(&route)));
        route
    }

    pub fn invalidate(&self) {
        *self.entry.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

fn text_hash(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}

/// Consumer of tick results (display, recorder, ...)
///
/// `None` means the tick had no position or no route to work with.
pub trait ResultSink: Send + Sync {
    fn publish(&self, result: Option<&TrackingResult>);
}

impl<F> ResultSink for F
where
    F: Fn(Option<&TrackingResult>) + Send + Sync,
{
    fn publish(&self, result: Option<&TrackingResult>) {
        self(result)
    }
}

/// Whether the loop currently has a background task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
}

/// Everything a tick needs, shared with the background task
struct TrackerCore {
    config: TrackerConfig,
    route_source: Arc<dyn RouteTextSource>,
    location: LocationService,
    cache: RouteCache,
    sinks: Vec<Arc<dyn ResultSink>>,
    results: watch::Sender<Option<TrackingResult>>,
    ticks: AtomicU64,
    // Held for a whole tick so background and manual ticks never overlap
    tick_guard: Mutex<()>,
}

impl TrackerCore {
    fn current_route(&self) -> Arc<Route> {
        let text = self.route_source.route_text();
        if self.config.cache_route {
            self.cache.resolve(text.as_deref())
        } else {
            Arc::new(text.as_deref().map(parse_route).unwrap_or_default())
        }
    }

    fn tick(&self) -> Option<TrackingResult> {
        let _guard = self.tick_guard.lock().unwrap_or_else(PoisonError::into_inner);
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        let route = self.current_route();
        let position = self.location.current_position();

        let result = nearest(position.as_ref(), &route).and_then(|found| {
            let position = position?;
            let waypoint = route.get(found.index)?;
            Some(TrackingResult {
                tick,
                waypoint_index: found.index,
                distance_m: found.distance_m,
                bearing_deg: bearing(&position, waypoint),
                position,
                route_name: route.name.clone(),
            })
        });

        match &result {
            Some(r) => debug!(
                tick,
                waypoint = r.waypoint_index,
                distance_m = r.distance_m,
                bearing_deg = r.bearing_deg,
                "Tracking tick"
            ),
            None => trace!(
                tick,
                has_position = position.is_some(),
                waypoints = route.len(),
                "Tracking tick without result"
            ),
        }

        self.results.send_replace(result.clone());
        for sink in &self.sinks {
            sink.publish(result.as_ref());
        }

        result
    }

    async fn run(self: Arc<Self>, cancel: CancellationToken) {
        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            cache_route = self.config.cache_route,
            "Tracking loop starting"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    info!(ticks = self.ticks.load(Ordering::SeqCst), "Tracking loop stopping");
                    break;
                }

                _ = interval.tick() => {
                    self.tick();
                }
            }
        }
    }
}

struct RunningTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Periodic nearest-waypoint and bearing computation
pub struct TrackingLoop {
    core: Arc<TrackerCore>,
    task: Mutex<Option<RunningTask>>,
}

impl TrackingLoop {
    /// Create an idle loop
    ///
    /// The fusion ranking of `location` is taken from `config`.
    pub fn new(
        config: TrackerConfig,
        route_source: Arc<dyn RouteTextSource>,
        location: LocationService,
    ) -> Self {
        let location = location.with_preference(config.accuracy_preference);
        let (results, _) = watch::channel(None);
        Self {
            core: Arc::new(TrackerCore {
                config,
                route_source,
                location,
                cache: RouteCache::new(),
                sinks: Vec::new(),
                results,
                ticks: AtomicU64::new(0),
                tick_guard: Mutex::new(()),
            }),
            task: Mutex::new(None),
        }
    }

    /// Register a sink that receives every tick's result
    ///
    /// Sinks are fixed once the loop has been started.
    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        match Arc::get_mut(&mut self.core) {
            Some(core) => core.sinks.push(sink),
            None => warn!("Cannot add a result sink to a loop that has been started"),
        }
        self
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.core.config
    }

    /// Watch channel carrying the latest tick's result
    pub fn subscribe(&self) -> watch::Receiver<Option<TrackingResult>> {
        self.core.results.subscribe()
    }

    /// Result of the most recent tick
    pub fn latest(&self) -> Option<TrackingResult> {
        self.core.results.borrow().clone()
    }

    /// Number of ticks executed so far
    pub fn tick_count(&self) -> u64 {
        self.core.ticks.load(Ordering::SeqCst)
    }

    /// Run a single tick on the calling thread and publish its result
    ///
    /// Waits for a tick already in progress on the background task.
    pub fn tick(&self) -> Option<TrackingResult> {
        self.core.tick()
    }

    pub fn state(&self) -> LoopState {
        let task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        match task.as_ref() {
            Some(running) if !running.handle.is_finished() => LoopState::Running,
            _ => LoopState::Idle,
        }
    }

    /// Start ticking on a background task
    ///
    /// Returns `false` if the loop was already running. Must be called from
    /// within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = task.as_ref() {
            if !running.handle.is_finished() {
                debug!("Tracking loop already running");
                return false;
            }
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(Arc::clone(&self.core).run(cancel.clone()));
        *task = Some(RunningTask { cancel, handle });
        true
    }

    /// Stop the background task and wait for it to finish
    ///
    /// Returns `false` if the loop was not running.
    pub async fn stop(&self) -> bool {
        let running = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(running) = running else {
            return false;
        };

        running.cancel.cancel();
        if let Err(e) = running.handle.await {
            warn!(error = %e, "Tracking task ended abnormally");
        }
        true
    }
}

impl Drop for TrackingLoop {
    fn drop(&mut self) {
        let task = self.task.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(running) = task.take() {
            running.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::{CachedPositionSource, PermissionGate};
    use crate::types::SourceKind;
    use std::time::Duration;

    const ROUTE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="route_pilot tests">
<rte><name>Test Route</name>
<rtept lat="60.1" lon="24.9"></rtept>
<rtept lat="60.2" lon="25.0"></rtept>
<rtept lat="60.3" lon="25.1"></rtept>
</rte>
</gpx>"#;

    fn fixture() -> (Arc<SharedRouteText>, Arc<CachedPositionSource>, LocationService) {
        let text = Arc::new(SharedRouteText::new());
        let gps = Arc::new(CachedPositionSource::new(SourceKind::Satellite));
        let location = LocationService::new(PermissionGate::granted()).with_source(gps.clone());
        (text, gps, location)
    }

    #[test]
    fn test_route_cache_reuses_until_text_changes() {
        let cache = RouteCache::new();
        let first = cache.resolve(Some(ROUTE));
        let second = cache.resolve(Some(ROUTE));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.len(), 3);

        let changed = ROUTE.replace("Test Route", "Renamed");
        let third = cache.resolve(Some(&changed));
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(third.name.as_deref(), Some("Renamed"));

        assert!(cache.resolve(None).is_empty());
    }

    #[test]
    fn test_tick_without_route_or_position() {
        let (text, gps, location) = fixture();
        let tracker = TrackingLoop::new(TrackerConfig::default(), text.clone(), location);

        assert_eq!(tracker.tick(), None);

        gps.update(60.25, 25.05, 5.0);
        assert_eq!(tracker.tick(), None);

        text.set(ROUTE);
        gps.clear();
        assert_eq!(tracker.tick(), None);
        assert_eq!(tracker.tick_count(), 3);
    }

    #[test]
    fn test_tick_finds_nearest_and_bearing() {
        let (text, gps, location) = fixture();
        text.set(ROUTE);
        gps.update(60.25, 25.05, 5.0);

        let tracker = TrackingLoop::new(TrackerConfig::default(), text, location);
        let result = tracker.tick().expect("tick should produce a result");
        assert_eq!(result.tick, 1);
        assert_eq!(result.waypoint_index, 2);
        assert!(result.distance_m > 0.0);
        assert!((0.0..360.0).contains(&result.bearing_deg));
        assert_eq!(result.route_name.as_deref(), Some("Test Route"));
        assert_eq!(tracker.latest(), Some(result));
    }

    #[test]
    fn test_uncached_route_follows_text() {
        let (text, gps, location) = fixture();
        text.set(ROUTE);
        gps.update(60.1, 24.9, 5.0);

        let config = TrackerConfig::default().with_route_cache(false);
        let tracker = TrackingLoop::new(config, text.clone(), location);
        assert_eq!(tracker.tick().map(|r| r.waypoint_index), Some(0));

        text.set("not a route");
        assert_eq!(tracker.tick(), None);
    }

    #[test]
    fn test_sinks_receive_every_tick() {
        let (text, gps, location) = fixture();
        text.set(ROUTE);
        gps.update(60.2, 25.0, 5.0);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let sink = move |result: Option<&TrackingResult>| {
            recorder
                .lock()
                .unwrap()
                .push(result.map(|r| r.waypoint_index));
        };

        let tracker =
            TrackingLoop::new(TrackerConfig::default(), text, location).with_sink(Arc::new(sink));
        tracker.tick();
        gps.clear();
        tracker.tick();

        assert_eq!(*seen.lock().unwrap(), vec![Some(1), None]);
    }

    #[test]
    fn test_file_route_text_tracks_availability() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("route.gpx");
        let source = FileRouteText::new(&path);

        assert!(source.route_text().is_none());
        assert!(source.unavailable.load(Ordering::Relaxed));
        assert!(source.route_text().is_none());
        assert!(source.unavailable.load(Ordering::Relaxed));

        std::fs::write(&path, ROUTE).expect("Failed to write route");
        assert_eq!(source.route_text().as_deref(), Some(ROUTE));
        assert!(!source.unavailable.load(Ordering::Relaxed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_manual_ticks_never_overlap_background_ticks() {
        use std::sync::atomic::AtomicUsize;

        let (text, gps, location) = fixture();
        text.set(ROUTE);
        gps.update(60.25, 25.05, 5.0);

        let active = Arc::new(AtomicUsize::new(0));
        let max_active = Arc::new(AtomicUsize::new(0));
        let seen_ticks = Arc::new(Mutex::new(Vec::new()));

        let sink = {
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            let seen_ticks = Arc::clone(&seen_ticks);
            move |result: Option<&TrackingResult>| {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now, Ordering::SeqCst);
                std::thread::sleep(Duration::from_micros(200));
                if let Some(r) = result {
                    seen_ticks.lock().unwrap().push(r.tick);
                }
                active.fetch_sub(1, Ordering::SeqCst);
            }
        };

        let config = TrackerConfig::default().with_poll_interval(Duration::from_millis(1));
        let tracker =
            Arc::new(TrackingLoop::new(config, text, location).with_sink(Arc::new(sink)));
        assert!(tracker.start());

        let manual = Arc::clone(&tracker);
        tokio::task::spawn_blocking(move || {
            for _ in 0..50 {
                manual.tick();
            }
        })
        .await
        .unwrap();

        assert!(tracker.stop().await);
        assert_eq!(max_active.load(Ordering::SeqCst), 1);

        let ticks = seen_ticks.lock().unwrap().clone();
        assert!(ticks.len() >= 50);
        assert!(ticks.windows(2).all(|w| w[0] < w[1]), "ticks out of order: {ticks:?}");
    }

    #[tokio::test]
    async fn test_start_is_idempotent_and_stop_returns_to_idle() {
        let (text, _gps, location) = fixture();
        let config = TrackerConfig::default().with_poll_interval(Duration::from_millis(10));
        let tracker = TrackingLoop::new(config, text, location);

        assert_eq!(tracker.state(), LoopState::Idle);
        assert!(tracker.start());
        assert!(!tracker.start());
        assert_eq!(tracker.state(), LoopState::Running);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(tracker.stop().await);
        assert_eq!(tracker.state(), LoopState::Idle);
        assert!(!tracker.stop().await);

        let ticks = tracker.tick_count();
        assert!(ticks >= 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(tracker.tick_count(), ticks);

        assert!(tracker.start());
        assert!(tracker.stop().await);
    }
}
