//! Pool registry.
//!
//! [`PoolRegistry`] owns one pool per configured key and routes consume,
//! refill and expiry operations to it. Configuration happens exactly once;
//! after that the key map is immutable, so routing needs no global lock.
//! Each pool is guarded by its own mutex.
//!
//! # Lifecycle
//!
//! ```ignore
//! let registry = Arc::new(PoolRegistry::new(provider, RegistrySettings::default()));
//! registry.configure(policies)?;
//! let sweeper = registry.start();          // start_all() + expiry sweep daemon
//!
//! if let Some(item) = registry.consume("home_feed") {
//!     render(item);
//! }
//!
//! registry.shutdown();
//! ```
//!
//! # Panics
//!
//! Calling `configure` twice, or `consume` / `start_all` / `sweep_all`
//! before `configure`, is a programming error and panics.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::notify::{PoolNotifier, PoolObserver, PoolUpdated, SubscriptionId, DEFAULT_EVENT_BUFFER};
use crate::pool::{PolicyError, PoolKey, PoolPolicy, PoolSnapshot};
use crate::provider::FetchProvider;
use crate::scheduler::{PoolSlot, RefillScheduler, SweepDaemon, DEFAULT_SWEEP_INTERVAL_SECS};

/// Registry-wide settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Interval between expiry sweeps (default: 60s).
    pub sweep_interval: Duration,
    /// Deadline for a single fetch; `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Buffer of the pool-updated broadcast channel (default: 64).
    pub event_buffer: usize,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            fetch_timeout: None,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

/// Owner of every pool.
pub struct PoolRegistry<T> {
    pools: OnceLock<HashMap<PoolKey, Arc<PoolSlot<T>>>>,
    scheduler: Arc<RefillScheduler<T>>,
    notifier: Arc<PoolNotifier>,
    settings: RegistrySettings,
    shutdown: CancellationToken,
}

impl<T> PoolRegistry<T>
where
    T: Send + 'static,
{
    /// Create an unconfigured registry on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime; use
    /// [`with_runtime`](Self::with_runtime) from other threads.
    pub fn new(provider: Arc<dyn FetchProvider<T>>, settings: RegistrySettings) -> Self {
        Self::with_runtime(provider, settings, Handle::current())
    }

    /// Create an unconfigured registry whose fetches and timers run on `runtime`.
    pub fn with_runtime(
        provider: Arc<dyn FetchProvider<T>>,
        settings: RegistrySettings,
        runtime: Handle,
    ) -> Self {
        let notifier = Arc::new(PoolNotifier::new(settings.event_buffer));
        let scheduler = Arc::new(RefillScheduler::new(
            provider,
            Arc::clone(&notifier),
            runtime,
            settings.fetch_timeout,
        ));

        Self {
            pools: OnceLock::new(),
            scheduler,
            notifier,
            settings,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Create one pool per policy.
    ///
    /// # Panics
    ///
    /// Panics if the registry was already configured.
    pub fn configure<I>(&self, policies: I) -> Result<(), PolicyError>
    where
        I: IntoIterator<Item = PoolPolicy>,
    {
        if self.is_configured() {
            panic!("PoolRegistry::configure called more than once");
        }

        let mut pools = HashMap::new();
        for policy in policies {
            policy.validate()?;
            if pools.contains_key(policy.key()) {
                return Err(PolicyError::DuplicateKey(policy.key().clone()));
            }
            debug!(policy = %policy, capacity = policy.capacity(), "Configuring pool");
            let key = policy.key().clone();
            let slot = Arc::new(PoolSlot::new(policy, self.shutdown.child_token()));
            if self.shutdown.is_cancelled() {
                slot.retire();
            }
            pools.insert(key, slot);
        }

        let count = pools.len();
        if self.pools.set(pools).is_err() {
            panic!("PoolRegistry::configure called more than once");
        }
        info!(pools = count, "Pool registry configured");
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.pools.get().is_some()
    }

    fn pools(&self) -> &HashMap<PoolKey, Arc<PoolSlot<T>>> {
        match self.pools.get() {
            Some(pools) => pools,
            None => panic!("PoolRegistry used before configure()"),
        }
    }

    /// Configured keys, sorted.
    pub fn keys(&self) -> Vec<PoolKey> {
        let mut keys: Vec<PoolKey> = self.pools().keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Policy configured for `key`.
    pub fn policy(&self, key: &str) -> Option<&PoolPolicy> {
        self.pools().get(key).map(|slot| slot.policy.as_ref())
    }

    /// Take the oldest item buffered for `key`.
    ///
    /// Returns `None` for an unknown key or an empty pool; never waits for an
    /// in-flight fetch. Every call on a known key runs a refill check.
    pub fn consume(&self, key: &str) -> Option<T> {
        let slot = self.pools().get(key)?;

        let (value, decision) = {
            let mut pool = slot.state.lock();
            let value = pool.try_consume();
            (value, pool.refill_check(Instant::now()))
        };
        self.scheduler.dispatch(slot, decision);
        value
    }

    /// Run a refill check on every pool (initial burst fill).
    pub fn start_all(&self) {
        let pools = self.pools();
        info!(pools = pools.len(), "Starting pool refills");
        for slot in pools.values() {
            self.scheduler.refill(slot);
        }
    }

    /// Expire stale items in every pool whose kind requires it.
    ///
    /// Returns the number of items removed.
    pub fn sweep_all(&self, now: Instant) -> usize {
        let mut expired = 0;
        for slot in self.pools().values() {
            if !slot.policy.kind().requires_expiry() {
                continue;
            }
            let outcome = slot.state.lock().sweep_expired(now);
            expired += outcome.expired;
            if let Some(decision) = outcome.refill {
                self.scheduler.dispatch(slot, decision);
            }
        }
        expired
    }

    /// Spawn the repeating expiry sweep at `settings.sweep_interval`.
    ///
    /// The daemon stops on [`shutdown`](Self::shutdown) or when the registry
    /// is dropped.
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let daemon = SweepDaemon::new(self, self.settings.sweep_interval);
        self.scheduler
            .runtime()
            .spawn(daemon.run(self.shutdown.child_token()))
    }

    /// [`start_all`](Self::start_all) followed by [`spawn_sweeper`](Self::spawn_sweeper).
    pub fn start(self: &Arc<Self>) -> JoinHandle<()> {
        self.start_all();
        self.spawn_sweeper()
    }

    /// Snapshot of the pool for `key`.
    pub fn snapshot(&self, key: &str) -> Option<PoolSnapshot> {
        let slot = self.pools().get(key)?;
        let snapshot = slot.state.lock().snapshot(Instant::now());
        Some(snapshot)
    }

    /// Snapshots of every pool, sorted by key.
    pub fn snapshots(&self) -> Vec<PoolSnapshot> {
        let now = Instant::now();
        let mut snapshots: Vec<PoolSnapshot> = self
            .pools()
            .values()
            .map(|slot| slot.state.lock().snapshot(now))
            .collect();
        snapshots.sort_by(|a, b| a.key.cmp(&b.key));
        snapshots
    }

    /// Register a synchronous pool-updated observer.
    pub fn subscribe(&self, observer: Arc<dyn PoolObserver>) -> SubscriptionId {
        self.notifier.subscribe(observer)
    }

    /// Remove an observer registered with [`subscribe`](Self::subscribe).
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.notifier.unsubscribe(id)
    }

    /// Receive pool-updated events through a broadcast channel.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<PoolUpdated> {
        self.notifier.subscribe_channel()
    }
}

impl<T> PoolRegistry<T> {
    /// Cancel all timers and the sweep daemon and retire every pool.
    ///
    /// Fetches already in flight are not cancelled; their results are
    /// discarded. Items still buffered remain consumable.
    pub fn shutdown(&self) {
        if self.shutdown.is_cancelled() {
            return;
        }
        self.shutdown.cancel();
        if let Some(pools) = self.pools.get() {
            for slot in pools.values() {
                slot.retire();
            }
        }
        info!("Pool registry shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl<T> Drop for PoolRegistry<T> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolKind;
    use crate::provider::{provider_fn, FetchError, FetchRequest};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    /// Provider that replays scripted outcomes and then succeeds forever.
    struct ScriptedProvider {
        script: Mutex<VecDeque<Result<u32, FetchError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<u32, FetchError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl FetchProvider<u32> for ScriptedProvider {
        fn fetch(&self, _request: FetchRequest) -> crate::provider::FetchFuture<u32> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as u32;
            let result = self.script.lock().pop_front().unwrap_or(Ok(n));
            Box::pin(async move { result })
        }
    }

    fn registry(provider: Arc<ScriptedProvider>) -> Arc<PoolRegistry<u32>> {
        Arc::new(PoolRegistry::new(provider, RegistrySettings::default()))
    }

    #[tokio::test]
    async fn test_configure_rejects_duplicate_keys() {
        let registry = registry(ScriptedProvider::new(vec![]));
        let result = registry.configure([
            PoolPolicy::new("feed", PoolKind::Native),
            PoolPolicy::new("feed", PoolKind::Rewarded),
        ]);
        assert_eq!(
            result,
            Err(PolicyError::DuplicateKey(PoolKey::new("feed")))
        );
        assert!(!registry.is_configured());
    }

    #[tokio::test]
    async fn test_configure_rejects_invalid_policy() {
        let registry = registry(ScriptedProvider::new(vec![]));
        let result = registry.configure([PoolPolicy::new("feed", PoolKind::Native).with_capacity(0)]);
        assert!(matches!(result, Err(PolicyError::ZeroCapacity(_))));
    }

    #[tokio::test]
    #[should_panic(expected = "configure called more than once")]
    async fn test_configure_twice_panics() {
        let registry = registry(ScriptedProvider::new(vec![]));
        registry.configure(Vec::<PoolPolicy>::new()).unwrap();
        let _ = registry.configure(Vec::<PoolPolicy>::new());
    }

    #[tokio::test]
    #[should_panic(expected = "used before configure")]
    async fn test_consume_before_configure_panics() {
        let registry = registry(ScriptedProvider::new(vec![]));
        registry.consume("feed");
    }

    #[tokio::test]
    async fn test_consume_unknown_key_is_none() {
        let registry = registry(ScriptedProvider::new(vec![]));
        registry.configure(Vec::<PoolPolicy>::new()).unwrap();
        assert_eq!(registry.consume("missing"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_all_burst_fills() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = registry(Arc::clone(&provider));
        registry
            .configure([PoolPolicy::new("video", PoolKind::Rewarded).with_capacity(3)])
            .unwrap();

        registry.start_all();
        settle().await;

        assert_eq!(provider.calls(), 3);
        let snapshot = registry.snapshot("video").unwrap();
        assert_eq!(snapshot.queued, 3);
        assert!(!snapshot.is_fetching);
    }

    #[tokio::test(start_paused = true)]
    async fn test_consume_is_fifo_and_refills() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = registry(Arc::clone(&provider));
        registry
            .configure([PoolPolicy::new("splash", PoolKind::Interstitial).with_capacity(2)])
            .unwrap();
        registry.start_all();
        settle().await;

        assert_eq!(registry.consume("splash"), Some(0));
        settle().await;
        assert_eq!(provider.calls(), 3);
        assert_eq!(registry.consume("splash"), Some(1));
        assert_eq!(registry.consume("splash"), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_never_surfaced() {
        let provider = ScriptedProvider::new(vec![
            Err(FetchError::Provider("no fill".into())),
            Err(FetchError::Empty),
        ]);
        let registry = registry(Arc::clone(&provider));
        registry
            .configure([PoolPolicy::new("feed", PoolKind::Native)
                .with_capacity(1)
                .with_failure_threshold(3)])
            .unwrap();

        registry.start_all();
        assert_eq!(registry.consume("feed"), None);
        settle().await;

        assert_eq!(provider.calls(), 3);
        assert_eq!(registry.consume("feed"), Some(2));
        assert_eq!(registry.snapshot("feed").unwrap().consecutive_failures, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_cooldown_blocks_fetches() {
        let provider = ScriptedProvider::new(vec![Err(FetchError::Empty)]);
        let registry = registry(Arc::clone(&provider));
        registry
            .configure([PoolPolicy::new("feed", PoolKind::Native)
                .with_failure_threshold(1)
                .with_cooldown(Duration::MAX)])
            .unwrap();

        registry.start_all();
        settle().await;
        assert_eq!(provider.calls(), 1);

        assert_eq!(registry.consume("feed"), None);
        settle().await;

        assert_eq!(provider.calls(), 1);
        let snapshot = registry.snapshot("feed").unwrap();
        assert_eq!(snapshot.status(), "cooldown");
        assert_eq!(snapshot.counters.cooldowns, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_all_only_touches_native_pools() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = registry(Arc::clone(&provider));
        registry
            .configure([
                PoolPolicy::new("feed", PoolKind::Native)
                    .with_capacity(1)
                    .with_stale_age(Duration::from_secs(60)),
                PoolPolicy::new("video", PoolKind::Rewarded)
                    .with_capacity(1)
                    .with_stale_age(Duration::from_secs(60)),
            ])
            .unwrap();
        registry.start_all();
        settle().await;

        let expired = registry.sweep_all(Instant::now() + Duration::from_secs(3600));
        assert_eq!(expired, 1);
        assert_eq!(registry.snapshot("video").unwrap().queued, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_observers_receive_each_enqueue() {
        let provider = ScriptedProvider::new(vec![]);
        let registry = registry(Arc::clone(&provider));
        registry
            .configure([PoolPolicy::new("feed", PoolKind::Native).with_capacity(2)])
            .unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = registry.subscribe(Arc::new(move |key: &PoolKey| {
            sink.lock().push(key.clone());
        }));
        let mut rx = registry.subscribe_channel();

        registry.start_all();
        settle().await;

        assert_eq!(seen.lock().len(), 2);
        assert_eq!(rx.recv().await.unwrap().key.as_str(), "feed");
        assert_eq!(rx.recv().await.unwrap().key.as_str(), "feed");

        assert!(registry.unsubscribe(id));
        registry.consume("feed");
        settle().await;
        assert_eq!(seen.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_late_completions() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let provider = Arc::new(provider_fn(move |_: FetchRequest| {
            counter.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, FetchError>(1u32)
            }
        }));
        let registry = Arc::new(PoolRegistry::new(provider, RegistrySettings::default()));
        registry
            .configure([PoolPolicy::new("feed", PoolKind::Native)])
            .unwrap();

        registry.start_all();
        settle().await;
        registry.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;

        let snapshot = registry.snapshot("feed").unwrap();
        assert_eq!(snapshot.queued, 0);
        assert!(!snapshot.is_fetching);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.is_shut_down());
    }

    #[tokio::test]
    async fn test_keys_are_sorted() {
        let registry = registry(ScriptedProvider::new(vec![]));
        registry
            .configure([
                PoolPolicy::new("b", PoolKind::Native),
                PoolPolicy::new("a", PoolKind::Rewarded),
            ])
            .unwrap();
        assert_eq!(registry.keys(), vec![PoolKey::new("a"), PoolKey::new("b")]);
        assert_eq!(registry.policy("a").unwrap().kind(), PoolKind::Rewarded);
    }
}
