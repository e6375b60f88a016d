//! Read-through TTL cache for the availability view.
//!
//! The system caches the whole availability list under a single entry, so
//! this is a one-slot cache rather than a keyed map. Concurrent misses
//! coalesce: the compute closure runs under the entry mutex, so N callers
//! racing an expired entry produce one recomputation, not N.
//!
//! The cache is advisory and eventually consistent with the store: a reader
//! racing between a commit and its invalidation can observe one stale
//! generation, bounded by the TTL. Confirm/cancel correctness never depends
//! on it.

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct CacheEntry<T> {
    value: Arc<T>,
    computed_at: Instant,
}

/// Single-entry cache with time-to-live expiry and stampede protection.
pub struct ReadThroughCache<T> {
    ttl: Duration,
    entry: Mutex<Option<CacheEntry<T>>>,
}

impl<T> ReadThroughCache<T> {
    /// Create an empty cache whose entries live for `ttl` after computation.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Return the cached value if present and unexpired, otherwise run
    /// `compute`, store its result and return it.
    ///
    /// The entry lock is held across `compute`, which is what coalesces a
    /// thundering herd of misses into a single recomputation per expiry
    /// window. A failed computation caches nothing.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `compute`.
    pub async fn get_or_compute<F, Fut, E>(&self, compute: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.computed_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&cached.value));
            }
        }

        let value = Arc::new(compute().await?);
        *entry = Some(CacheEntry {
            value: Arc::clone(&value),
            computed_at: Instant::now(),
        });
        Ok(value)
    }

    /// Drop the entry, forcing the next read to recompute.
    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}
