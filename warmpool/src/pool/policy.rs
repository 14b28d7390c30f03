//! Pool keys, kinds and per-key policies.
//!
//! A [`PoolPolicy`] is immutable once built. The registry validates every
//! policy at configure time, so the rest of the crate can rely on
//! `capacity >= 1` and `failure_threshold >= 1`.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::error::PolicyError;

/// Default number of items buffered per pool.
pub const DEFAULT_CAPACITY: usize = 2;

/// Default consecutive failures tolerated before a cooldown starts.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;

/// Default cooldown before retrying a failing provider (30 seconds).
pub const DEFAULT_COOLDOWN_SECS: u64 = 30;

/// Default maximum age of a buffered item (1 hour).
pub const DEFAULT_STALE_AGE_SECS: u64 = 60 * 60;

/// Identifier of a pool, unique across a registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolKey(String);

impl PoolKey {
    /// Create a key from any string-like value.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PoolKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PoolKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for PoolKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Kind of item a pool buffers.
///
/// The kind is forwarded to the fetch provider so it can pick the right
/// remote call. Only [`PoolKind::Native`] items go stale and are swept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// Inline items rendered by the host UI; expire after `stale_age`.
    Native,
    /// Full-screen items shown between screens.
    Interstitial,
    /// Items granted in exchange for user action.
    Rewarded,
}

impl PoolKind {
    /// Whether buffered items of this kind must be swept periodically.
    pub fn requires_expiry(self) -> bool {
        matches!(self, PoolKind::Native)
    }

    /// Lowercase name used in config files and logs.
    pub fn name(self) -> &'static str {
        match self {
            PoolKind::Native => "native",
            PoolKind::Interstitial => "interstitial",
            PoolKind::Rewarded => "rewarded",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PoolKind {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "native" => Ok(PoolKind::Native),
            "interstitial" => Ok(PoolKind::Interstitial),
            "rewarded" | "video" => Ok(PoolKind::Rewarded),
            other => Err(PolicyError::UnknownKind(other.to_string())),
        }
    }
}

/// Immutable refill policy for one pool.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use warmpool::pool::{PoolKind, PoolPolicy};
///
/// let policy = PoolPolicy::new("home_feed", PoolKind::Native)
///     .with_capacity(3)
///     .with_failure_threshold(2)
///     .with_cooldown(Duration::from_secs(10));
///
/// assert_eq!(policy.capacity(), 3);
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPolicy {
    key: PoolKey,
    kind: PoolKind,
    unit_id: String,
    capacity: usize,
    failure_threshold: u32,
    cooldown: Duration,
    stale_age: Duration,
}

impl PoolPolicy {
    /// Create a policy with default limits. The unit id defaults to the key.
    pub fn new(key: impl Into<PoolKey>, kind: PoolKind) -> Self {
        let key = key.into();
        Self {
            unit_id: key.as_str().to_string(),
            key,
            kind,
            capacity: DEFAULT_CAPACITY,
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS),
            stale_age: Duration::from_secs(DEFAULT_STALE_AGE_SECS),
        }
    }

    /// Set the provider-side unit identifier.
    pub fn with_unit_id(mut self, unit_id: impl Into<String>) -> Self {
        self.unit_id = unit_id.into();
        self
    }

    /// Set the maximum number of buffered items.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set how many consecutive failures are retried immediately.
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the wait after the failure threshold is reached.
    ///
    /// Values above [`MAX_COOLDOWN`](crate::pool::MAX_COOLDOWN) behave as an
    /// indefinite cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Set the age at which buffered items are dropped (native pools only).
    pub fn with_stale_age(mut self, stale_age: Duration) -> Self {
        self.stale_age = stale_age;
        self
    }

    pub fn key(&self) -> &PoolKey {
        &self.key
    }

    pub fn kind(&self) -> PoolKind {
        self.kind
    }

    pub fn unit_id(&self) -> &str {
        &self.unit_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn stale_age(&self) -> Duration {
        self.stale_age
    }

    /// Check the policy limits.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.key.as_str().trim().is_empty() {
            return Err(PolicyError::EmptyKey);
        }
        if self.capacity == 0 {
            return Err(PolicyError::ZeroCapacity(self.key.clone()));
        }
        if self.failure_threshold == 0 {
            return Err(PolicyError::ZeroFailureThreshold(self.key.clone()));
        }
        Ok(())
    }
}

impl fmt::Display for PoolPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[key: {}, kind: {}, unit: {}]",
            self.key, self.kind, self.unit_id
        )
    }
}
