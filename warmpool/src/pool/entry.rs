//! A single buffered item.

use std::time::Duration;

use tokio::time::Instant;

/// A fetched item and the instant it entered its pool.
#[derive(Debug, Clone)]
pub struct PoolEntry<T> {
    pub value: T,
    pub arrived_at: Instant,
}

impl<T> PoolEntry<T> {
    pub fn new(value: T, arrived_at: Instant) -> Self {
        Self { value, arrived_at }
    }

    /// Age of the entry at `now`, saturating at zero.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.arrived_at)
    }

    /// Whether the entry has reached `stale_age` at `now`.
    pub fn is_stale(&self, now: Instant, stale_age: Duration) -> bool {
        self.age(now) >= stale_age
    }
}
