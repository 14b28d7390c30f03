//! Per-key pools of prefetched items.
//!
//! - [`PoolPolicy`]: immutable limits for one key
//! - [`PoolEntry`]: a buffered item and its arrival time
//! - [`KeyPool`]: the bounded queue plus its refill/backoff state machine
//! - [`PoolSnapshot`]: diagnostics view of a pool

mod entry;
mod error;
mod key_pool;
mod policy;
mod snapshot;

pub use entry::PoolEntry;
pub use error::PolicyError;
pub use key_pool::{
    FailureOutcome, KeyPool, RefillDecision, SkipReason, SuccessOutcome, SweepOutcome,
    MAX_COOLDOWN,
};
pub use policy::{
    PoolKey, PoolKind, PoolPolicy, DEFAULT_CAPACITY, DEFAULT_COOLDOWN_SECS,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_STALE_AGE_SECS,
};
pub use snapshot::{PoolCounters, PoolSnapshot};
