//! Tracker configuration

use crate::fusion::AccuracyPreference;
use crate::{Result, TrackerError};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Default interval between tracking ticks (1 second)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Options controlling the tracking loop
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Milliseconds between ticks
    pub poll_interval_ms: u64,
    /// Ranking of competing readings during fusion
    pub accuracy_preference: AccuracyPreference,
    /// Reuse the parsed route while the route text is unchanged
    pub cache_route: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            accuracy_preference: AccuracyPreference::default(),
            cache_route: true,
        }
    }
}

impl TrackerConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_accuracy_preference(mut self, preference: AccuracyPreference) -> Self {
        self.accuracy_preference = preference;
        self
    }

    pub fn with_route_cache(mut self, enabled: bool) -> Self {
        self.cache_route = enabled;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(TrackerError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load a configuration from a JSON file; missing keys take defaults
    #[cfg(feature = "json")]
    pub fn from_json_file(path: &std::path::Path) -> Result<Self> {
        use anyhow::Context;

        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: TrackerConfig = serde_json::from_str(&text)
            .map_err(|e| TrackerError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}
