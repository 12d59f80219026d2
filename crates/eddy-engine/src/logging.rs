//! Diagnostics setup.
//!
//! Every crate in the workspace logs through `tracing`; this installs the
//! process-wide subscriber. The `EDDY_LOG` environment variable, when set
//! to a valid filter, overrides the configured level. Sessions normally
//! call [`SessionConfig::init_logging`](crate::SessionConfig::init_logging),
//! which applies the configured `log_level`.

use tracing_subscriber::EnvFilter;

/// Environment variable overriding the configured filter.
pub const LOG_ENV: &str = "EDDY_LOG";

/// Resolve the filter: `EDDY_LOG` if valid, else `default_filter` if
/// valid, else `info`.
pub fn filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install a formatted subscriber writing to stderr.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one stays in place.
pub fn init(default_filter: &str) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter(default_filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
