//! Time source abstraction.
//!
//! Hold expiry is evaluated lazily against the engine's clock, so tests need
//! to control "now" deterministically. Production code uses [`SystemClock`];
//! `slotbook-testing` provides a fixed, advanceable clock.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
