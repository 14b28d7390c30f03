//! Fetch dispatch and cooldown timers.
//!
//! The [`RefillScheduler`] turns the decisions returned by [`KeyPool`] into
//! tokio tasks:
//!
//! - `RefillDecision::Fetch` spawns one fetch task; its completion re-enters
//!   the pool lock and feeds `on_fetch_success` / `on_fetch_failure`.
//! - `FailureOutcome::Cooldown` arms a one-shot timer that calls
//!   `on_cooldown_expired` with the cooldown's generation.
//!
//! # Ownership
//!
//! Spawned tasks hold only a `Weak` reference to the pool slot, so a dropped
//! registry is never kept alive by a pending fetch or timer. Timers also
//! watch the slot's cancellation token and exit on shutdown. Every callback
//! takes the pool lock and checks that the pool is still active before
//! mutating it.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::notify::PoolNotifier;
use crate::pool::{FailureOutcome, KeyPool, PoolPolicy, RefillDecision};
use crate::provider::{FetchError, FetchProvider, FetchRequest};

/// One pool together with the token that bounds its timers.
pub(crate) struct PoolSlot<T> {
    pub(crate) policy: Arc<PoolPolicy>,
    pub(crate) state: Mutex<KeyPool<T>>,
    pub(crate) lifetime: CancellationToken,
}

impl<T> PoolSlot<T> {
    pub(crate) fn new(policy: PoolPolicy, lifetime: CancellationToken) -> Self {
        let policy = Arc::new(policy);
        Self {
            state: Mutex::new(KeyPool::new(Arc::clone(&policy))),
            policy,
            lifetime,
        }
    }

    /// Cancel the slot's timers and retire the pool.
    ///
    /// The token is cancelled before taking the lock, so once this returns no
    /// callback can observe an active pool.
    pub(crate) fn retire(&self) {
        self.lifetime.cancel();
        self.state.lock().retire();
    }
}

/// Drives fetches and cooldown timers for every pool of a registry.
pub(crate) struct RefillScheduler<T> {
    provider: Arc<dyn FetchProvider<T>>,
    notifier: Arc<PoolNotifier>,
    runtime: Handle,
    fetch_timeout: Option<Duration>,
}

impl<T> RefillScheduler<T>
where
    T: Send + 'static,
{
    pub(crate) fn new(
        provider: Arc<dyn FetchProvider<T>>,
        notifier: Arc<PoolNotifier>,
        runtime: Handle,
        fetch_timeout: Option<Duration>,
    ) -> Self {
        Self {
            provider,
            notifier,
            runtime,
            fetch_timeout,
        }
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Run a refill check on `slot` and act on the result.
    pub(crate) fn refill(self: &Arc<Self>, slot: &Arc<PoolSlot<T>>) {
        let decision = slot.state.lock().refill_check(Instant::now());
        self.dispatch(slot, decision);
    }

    /// Act on a refill decision taken under the pool lock.
    pub(crate) fn dispatch(self: &Arc<Self>, slot: &Arc<PoolSlot<T>>, decision: RefillDecision) {
        if decision.is_fetch() {
            self.spawn_fetch(slot);
        }
    }

    fn spawn_fetch(self: &Arc<Self>, slot: &Arc<PoolSlot<T>>) {
        if slot.lifetime.is_cancelled() {
            trace!(key = %slot.policy.key(), "Not fetching for retired pool");
            return;
        }

        let request = FetchRequest::for_policy(&slot.policy);
        let fetch = self.provider.fetch(request);
        let timeout = self.fetch_timeout;
        let weak = Arc::downgrade(slot);
        let scheduler = Arc::clone(self);

        self.runtime.spawn(async move {
            let result = match timeout {
                Some(limit) => tokio::time::timeout(limit, fetch)
                    .await
                    .unwrap_or(Err(FetchError::TimedOut(limit))),
                None => fetch.await,
            };

            match weak.upgrade() {
                Some(slot) => scheduler.complete_fetch(&slot, result),
                None => trace!("Fetch completed after its pool was dropped"),
            }
        });
    }

    fn complete_fetch(self: &Arc<Self>, slot: &Arc<PoolSlot<T>>, result: Result<T, FetchError>) {
        let now = Instant::now();
        let mut pool = slot.state.lock();
        if pool.is_retired() {
            debug!(key = %slot.policy.key(), "Ignoring fetch completion for retired pool");
            return;
        }

        match result {
            Ok(value) => {
                let outcome = pool.on_fetch_success(value, now);
                drop(pool);

                if outcome.enqueued {
                    self.notifier.notify(slot.policy.key());
                }
                self.dispatch(slot, outcome.next);
            }
            Err(error) => {
                let outcome = pool.on_fetch_failure(now);
                let failures = pool.consecutive_failures();
                drop(pool);

                warn!(
                    key = %slot.policy.key(),
                    unit = slot.policy.unit_id(),
                    failures,
                    error = %error,
                    "Fetch failed"
                );

                match outcome {
                    FailureOutcome::Retry(decision) => self.dispatch(slot, decision),
                    FailureOutcome::Cooldown { until, generation } => {
                        self.arm_cooldown(slot, until, generation)
                    }
                }
            }
        }
    }

    fn arm_cooldown(self: &Arc<Self>, slot: &Arc<PoolSlot<T>>, until: Instant, generation: u64) {
        let weak: Weak<PoolSlot<T>> = Arc::downgrade(slot);
        let lifetime = slot.lifetime.clone();
        let scheduler = Arc::clone(self);

        self.runtime.spawn(async move {
            tokio::select! {
                biased;

                _ = lifetime.cancelled() => {
                    trace!(generation, "Cooldown timer cancelled");
                }

                _ = tokio::time::sleep_until(until) => {
                    if let Some(slot) = weak.upgrade() {
                        scheduler.expire_cooldown(&slot, generation);
                    }
                }
            }
        });
    }

    fn expire_cooldown(self: &Arc<Self>, slot: &Arc<PoolSlot<T>>, generation: u64) {
        let decision = slot
            .state
            .lock()
            .on_cooldown_expired(generation, Instant::now());

        if let Some(decision) = decision {
            self.dispatch(slot, decision);
        }
    }
}
