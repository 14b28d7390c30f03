//! Refill scheduling.
//!
//! - `RefillScheduler` (crate-internal): spawns fetches, arms cooldown timers
//!   and feeds their results back into each pool's state machine
//! - [`SweepDaemon`]: repeating expiry sweep across a registry

mod refill;
mod sweep;

pub(crate) use refill::{PoolSlot, RefillScheduler};
pub use sweep::{SweepDaemon, DEFAULT_SWEEP_INTERVAL_SECS, MIN_SWEEP_INTERVAL};
