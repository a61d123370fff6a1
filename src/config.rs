//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::Ttl;

/// Default TTL applied by `set`, `set_list` and `fetch`.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Default period of the background sweeper.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// TTL used when no explicit TTL is given
    pub default_ttl: Ttl,
    /// Background sweep period, None = no background sweeper
    pub cleanup_interval: Option<Duration>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in milliseconds, 0 = never expire (default: 300000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Sweep period in milliseconds, 0 = no sweeper (default: 1000)
    pub fn from_env() -> Self {
        let default_ttl = match env_millis("CACHE_DEFAULT_TTL_MS") {
            Some(Duration::ZERO) => Ttl::Never,
            Some(ttl) => Ttl::After(ttl),
            None => Ttl::After(DEFAULT_TTL),
        };

        let cleanup_interval = match env_millis("CACHE_CLEANUP_INTERVAL_MS") {
            Some(Duration::ZERO) => None,
            Some(interval) => Some(interval),
            None => Some(DEFAULT_CLEANUP_INTERVAL),
        };

        Self {
            default_ttl,
            cleanup_interval,
        }
    }

    /// Sets the TTL used when none is given explicitly.
    pub fn with_default_ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.default_ttl = ttl.into();
        self
    }

    /// Sets the period of the background sweeper.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = Some(interval);
        self
    }

    /// Disables the background sweeper. `delete_expired` still works.
    pub fn without_cleanup(mut self) -> Self {
        self.cleanup_interval = None;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_ttl: Ttl::After(DEFAULT_TTL),
            cleanup_interval: Some(DEFAULT_CLEANUP_INTERVAL),
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .map(Duration::from_millis)
}
