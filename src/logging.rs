//! Logging setup
//!
//! Library code logs through `tracing`; binaries call [`init_logging`] once
//! to install a subscriber. `RUST_LOG` overrides the default level.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset
pub fn default_filter(debug: bool) -> &'static str {
    if debug {
        "route_pilot=debug,info"
    } else {
        "info"
    }
}

/// Install a stderr subscriber
///
/// Returns an error if a global subscriber is already set.
pub fn init_logging(debug: bool) -> crate::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| crate::TrackerError::Config(format!("Logging already initialized: {}", e)))
}
