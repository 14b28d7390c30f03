//! Periodic expiry sweep daemon.
//!
//! Runs [`PoolRegistry::sweep_all`] on a fixed interval until shutdown is
//! signalled or the registry is dropped.
//!
//! # Example
//!
//! ```ignore
//! use warmpool::scheduler::SweepDaemon;
//!
//! let daemon = SweepDaemon::new(&registry, Duration::from_secs(60));
//! tokio::spawn(daemon.run(shutdown_token));
//! ```

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::registry::PoolRegistry;

/// Default interval between expiry sweeps (60 seconds).
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Shortest interval the daemon accepts.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(100);

/// Background task that expires stale items across a registry.
pub struct SweepDaemon<T> {
    registry: Weak<PoolRegistry<T>>,
    interval: Duration,
}

impl<T> SweepDaemon<T>
where
    T: Send + 'static,
{
    /// Create a daemon for `registry`. Holds only a weak reference.
    pub fn new(registry: &Arc<PoolRegistry<T>>, interval: Duration) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            interval: interval.max(MIN_SWEEP_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep every `interval` until `shutdown` fires or the registry is gone.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs_f64(),
            "Expiry sweep daemon starting"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first immediate tick
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Expiry sweep daemon shutting down");
                    break;
                }

                _ = ticker.tick() => {
                    let Some(registry) = self.registry.upgrade() else {
                        debug!("Registry dropped, stopping expiry sweep");
                        break;
                    };

                    let expired = registry.sweep_all(Instant::now());
                    if expired > 0 {
                        debug!(expired, "Expiry sweep removed stale items");
                    }
                }
            }
        }
    }
}
