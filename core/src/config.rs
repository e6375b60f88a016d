//! Engine configuration.
//!
//! Loaded from environment variables with the defaults the system was
//! designed around: 5-minute hold windows, 10-second availability cache.

use std::env;
use std::time::Duration;

/// Tunables for the reservation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a new hold stays confirmable, in seconds. Default: 300.
    pub hold_ttl_secs: u64,
    /// Availability cache time-to-live, in seconds. Default: 10, long
    /// enough to absorb read bursts while bounding staleness from
    /// lazily-expired holds.
    pub cache_ttl_secs: u64,
}

impl EngineConfig {
    /// Load configuration from `HOLD_TTL_SECS` / `AVAILABILITY_CACHE_TTL_SECS`,
    /// falling back to defaults for missing or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            hold_ttl_secs: env::var("HOLD_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            cache_ttl_secs: env::var("AVAILABILITY_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        }
    }

    /// Hold lifetime as a chrono duration for expiry arithmetic.
    #[must_use]
    pub fn hold_ttl(&self) -> chrono::Duration {
        i64::try_from(self.hold_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }

    /// Cache lifetime as a std duration.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_ttl_secs: 300,
            cache_ttl_secs: 10,
        }
    }
}
