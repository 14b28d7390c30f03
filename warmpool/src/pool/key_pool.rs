//! Per-key refill and backoff state machine.
//!
//! [`KeyPool`] holds the buffered entries for one key together with its
//! fetch/backoff state. It performs no I/O: every transition takes `now`
//! explicitly and returns a decision that the refill scheduler acts on
//! (spawn a fetch, arm a cooldown timer).
//!
//! # State Machine
//!
//! ```text
//! Idle --[refill_check, eligible]--> Fetching
//! Fetching --[success]--> Idle --> refill_check (burst fill)
//! Fetching --[failure, failures < threshold]--> Idle --> refill_check
//! Fetching --[failure, failures >= threshold]--> Cooldown
//! Cooldown --[cooldown expired]--> Idle --> refill_check
//! ```
//!
//! The failure counter is only reset by a successful fetch. A provider that
//! keeps failing therefore re-enters cooldown after a single attempt once
//! the threshold has been reached.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::entry::PoolEntry;
use super::policy::PoolPolicy;
use super::snapshot::{PoolCounters, PoolSnapshot};

/// Longest cooldown actually scheduled (about 30 years).
///
/// Longer cooldowns, up to `Duration::MAX`, are clamped so the deadline
/// stays representable as an `Instant`.
pub const MAX_COOLDOWN: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why a refill check did not start a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The queue already holds `capacity` entries.
    Full,
    /// A fetch is already in flight for this key.
    Fetching,
    /// The pool is waiting out a cooldown.
    CoolingDown,
    /// The pool was shut down.
    Retired,
}

/// Outcome of a refill check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefillDecision {
    /// The pool is now fetching; the caller must issue exactly one fetch.
    Fetch,
    /// Nothing to do.
    Skip(SkipReason),
}

impl RefillDecision {
    pub fn is_fetch(self) -> bool {
        matches!(self, RefillDecision::Fetch)
    }
}

/// Outcome of a successful fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessOutcome {
    /// Whether the item was appended (false only on a capacity overrun).
    pub enqueued: bool,
    /// Follow-up refill decision.
    pub next: RefillDecision,
}

/// Outcome of a failed fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Below the failure threshold: retry according to the decision.
    Retry(RefillDecision),
    /// Threshold reached: a cooldown timer must fire at `until`.
    ///
    /// `generation` identifies this cooldown; an expiry carrying an older
    /// generation is ignored.
    Cooldown { until: Instant, generation: u64 },
}

/// Outcome of an expiry sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Number of entries removed.
    pub expired: usize,
    /// Refill decision when the queue ended below capacity.
    pub refill: Option<RefillDecision>,
}

/// Bounded FIFO of prefetched items for a single key.
#[derive(Debug)]
pub struct KeyPool<T> {
    policy: Arc<PoolPolicy>,
    queue: VecDeque<PoolEntry<T>>,
    is_fetching: bool,
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
    cooldown_generation: u64,
    retired: bool,
    counters: PoolCounters,
}

impl<T> KeyPool<T> {
    /// Create an idle pool: empty queue, zero failures, no cooldown.
    pub fn new(policy: Arc<PoolPolicy>) -> Self {
        Self {
            queue: VecDeque::with_capacity(policy.capacity()),
            policy,
            is_fetching: false,
            consecutive_failures: 0,
            cooldown_until: None,
            cooldown_generation: 0,
            retired: false,
            counters: PoolCounters::default(),
        }
    }

    pub fn policy(&self) -> &Arc<PoolPolicy> {
        &self.policy
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.len() >= self.policy.capacity()
    }

    pub fn is_fetching(&self) -> bool {
        self.is_fetching
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn cooldown_until(&self) -> Option<Instant> {
        self.cooldown_until
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Whether a cooldown is in effect at `now`.
    pub fn is_cooling_down(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    /// Remove and return the oldest buffered value.
    ///
    /// The caller is expected to follow up with [`refill_check`](Self::refill_check).
    pub fn try_consume(&mut self) -> Option<T> {
        let entry = self.queue.pop_front()?;
        self.counters.consumed += 1;
        trace!(key = %self.policy.key(), remaining = self.queue.len(), "Consumed pooled item");
        Some(entry.value)
    }

    /// Append a fetched value.
    ///
    /// Resets the failure counter. Returns `false` without modifying the queue
    /// when the pool is already full.
    ///
    /// The pool emits no events itself. The registry's refill scheduler
    /// publishes a [`PoolUpdated`](crate::notify::PoolUpdated) for every
    /// `true` returned here (via [`SuccessOutcome::enqueued`]), after the
    /// pool lock is released. Callers driving a `KeyPool` directly must
    /// notify their own observers.
    pub fn enqueue(&mut self, value: T, now: Instant) -> bool {
        if self.is_full() {
            self.counters.rejected += 1;
            warn!(
                key = %self.policy.key(),
                capacity = self.policy.capacity(),
                "Dropping fetched item: pool already full"
            );
            return false;
        }

        self.consecutive_failures = 0;
        self.queue.push_back(PoolEntry::new(value, now));
        debug!(
            key = %self.policy.key(),
            queued = self.queue.len(),
            capacity = self.policy.capacity(),
            "Pool received item"
        );
        true
    }

    /// Decide whether a fetch should start now.
    ///
    /// Eligible when the queue has room, nothing is in flight and no cooldown
    /// is active. An elapsed cooldown is cleared here. When eligible the pool
    /// is marked as fetching and the caller must issue exactly one fetch.
    pub fn refill_check(&mut self, now: Instant) -> RefillDecision {
        let decision = self.evaluate_refill(now);
        match decision {
            RefillDecision::Fetch => {
                self.cooldown_until = None;
                self.is_fetching = true;
                self.counters.fetches_started += 1;
                debug!(key = %self.policy.key(), queued = self.queue.len(), "Starting fetch");
            }
            RefillDecision::Skip(reason) => {
                trace!(key = %self.policy.key(), ?reason, "Refill skipped");
            }
        }
        decision
    }

    fn evaluate_refill(&self, now: Instant) -> RefillDecision {
        if self.retired {
            RefillDecision::Skip(SkipReason::Retired)
        } else if self.is_full() {
            RefillDecision::Skip(SkipReason::Full)
        } else if self.is_fetching {
            RefillDecision::Skip(SkipReason::Fetching)
        } else if self.is_cooling_down(now) {
            RefillDecision::Skip(SkipReason::CoolingDown)
        } else {
            RefillDecision::Fetch
        }
    }

    /// Record a successful fetch, enqueue the value and check for more room.
    pub fn on_fetch_success(&mut self, value: T, now: Instant) -> SuccessOutcome {
        self.is_fetching = false;
        self.counters.fetch_successes += 1;
        let enqueued = self.enqueue(value, now);
        let next = self.refill_check(now);
        SuccessOutcome { enqueued, next }
    }

    /// Record a failed fetch.
    ///
    /// Below the threshold the pool retries immediately; otherwise it enters
    /// a cooldown of `policy.cooldown()` starting at `now`.
    pub fn on_fetch_failure(&mut self, now: Instant) -> FailureOutcome {
        self.is_fetching = false;
        self.counters.fetch_failures += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures < self.policy.failure_threshold() {
            debug!(
                key = %self.policy.key(),
                failures = self.consecutive_failures,
                threshold = self.policy.failure_threshold(),
                "Retrying fetch immediately"
            );
            return FailureOutcome::Retry(self.refill_check(now));
        }

        let until = now + self.policy.cooldown().min(MAX_COOLDOWN);
        self.cooldown_until = Some(until);
        self.cooldown_generation += 1;
        self.counters.cooldowns += 1;
        debug!(
            key = %self.policy.key(),
            failures = self.consecutive_failures,
            cooldown_secs = self.policy.cooldown().as_secs_f64(),
            "Failure threshold reached, cooling down"
        );
        FailureOutcome::Cooldown {
            until,
            generation: self.cooldown_generation,
        }
    }

    /// Handle the cooldown timer for `generation` firing.
    ///
    /// Returns `None` when the timer is stale: a newer cooldown replaced it,
    /// the cooldown was already cleared by an earlier refill, or the pool was
    /// retired. The failure counter is left untouched.
    pub fn on_cooldown_expired(&mut self, generation: u64, now: Instant) -> Option<RefillDecision> {
        if self.retired || generation != self.cooldown_generation || self.cooldown_until.is_none() {
            trace!(key = %self.policy.key(), generation, "Ignoring stale cooldown timer");
            return None;
        }

        self.cooldown_until = None;
        debug!(
            key = %self.policy.key(),
            failures = self.consecutive_failures,
            "Cooldown expired"
        );
        Some(self.refill_check(now))
    }

    /// Drop entries that reached `stale_age` at `now`.
    ///
    /// Only pools whose kind requires expiry are swept. Survivors keep their
    /// order. Sweeping twice at the same instant removes nothing the second
    /// time.
    pub fn sweep_expired(&mut self, now: Instant) -> SweepOutcome {
        if !self.policy.kind().requires_expiry() {
            return SweepOutcome {
                expired: 0,
                refill: None,
            };
        }

        let stale_age = self.policy.stale_age();
        let before = self.queue.len();
        self.queue.retain(|entry| !entry.is_stale(now, stale_age));
        let expired = before - self.queue.len();
        self.counters.expired += expired as u64;

        if expired > 0 {
            debug!(key = %self.policy.key(), expired, remaining = self.queue.len(), "Swept stale items");
        }

        let refill = (self.queue.len() < self.policy.capacity()).then(|| self.refill_check(now));
        SweepOutcome { expired, refill }
    }

    /// Stop the pool. Later completions and timers become no-ops.
    pub fn retire(&mut self) {
        self.retired = true;
        self.is_fetching = false;
        self.cooldown_until = None;
    }

    /// Point-in-time view of the pool.
    pub fn snapshot(&self, now: Instant) -> PoolSnapshot {
        PoolSnapshot {
            key: self.policy.key().clone(),
            kind: self.policy.kind(),
            queued: self.queue.len(),
            capacity: self.policy.capacity(),
            is_fetching: self.is_fetching,
            consecutive_failures: self.consecutive_failures,
            cooldown_remaining: self
                .cooldown_until
                .map(|until| until.saturating_duration_since(now))
                .filter(|remaining| *remaining > Duration::ZERO),
            oldest_age: self.queue.front().map(|entry| entry.age(now)),
            counters: self.counters,
        }
    }
}
