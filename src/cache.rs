//! Time-windowed memoization of the metric snapshot.
//!
//! One scrape can resolve hundreds of metric names; the cache makes sure all
//! of them are served from a single admin-console round trip until the expiry
//! window elapses. The current instant is passed in by the caller so tests
//! can run against a fixed clock.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Slot<T> {
    stored_at: Instant,
    value: Arc<T>,
}

/// Memoizes the last produced value for a fixed expiry window.
pub struct TtlCache<T> {
    expiry: Duration,
    slot: Option<Slot<T>>,
}

impl<T> TtlCache<T> {
    #[must_use]
    pub const fn new(expiry: Duration) -> Self {
        Self { expiry, slot: None }
    }

    /// Returns the stored value if it is still within the expiry window.
    #[must_use]
    pub fn get(&self, now: Instant) -> Option<Arc<T>> {
        self.slot
            .as_ref()
            .filter(|slot| now.saturating_duration_since(slot.stored_at) <= self.expiry)
            .map(|slot| Arc::clone(&slot.value))
    }

    /// Stores a freshly produced value, restarting the expiry window.
    pub fn store(&mut self, now: Instant, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.slot = Some(Slot {
            stored_at: now,
            value: Arc::clone(&value),
        });
        value
    }

    /// Returns the cached value while fresh, otherwise invokes `produce` and
    /// stores its result.
    ///
    /// A failed producer propagates the error without touching the stored
    /// slot; the stale value is never reused in its place.
    ///
    /// # Errors
    ///
    /// Returns whatever error `produce` yields.
    pub async fn get_or_refresh<E, Fut>(
        &mut self,
        now: Instant,
        produce: impl FnOnce() -> Fut,
    ) -> Result<Arc<T>, E>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.get(now) {
            return Ok(value);
        }
        let value = produce().await?;
        Ok(self.store(now, value))
    }
}
