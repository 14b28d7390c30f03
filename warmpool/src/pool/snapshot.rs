//! Point-in-time pool state for diagnostics.

use std::fmt;
use std::time::Duration;

use super::policy::{PoolKey, PoolKind};

/// Lifetime counters for one pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolCounters {
    /// Fetches issued to the provider.
    pub fetches_started: u64,
    /// Fetches that returned an item.
    pub fetch_successes: u64,
    /// Fetches that failed or timed out.
    pub fetch_failures: u64,
    /// Times the failure threshold was reached.
    pub cooldowns: u64,
    /// Items handed out by `consume`.
    pub consumed: u64,
    /// Items dropped by the expiry sweep.
    pub expired: u64,
    /// Fetched items dropped because the pool was full.
    pub rejected: u64,
}

/// Snapshot of a single pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub key: PoolKey,
    pub kind: PoolKind,
    pub queued: usize,
    pub capacity: usize,
    pub is_fetching: bool,
    pub consecutive_failures: u32,
    /// Time left before retries resume, if cooling down.
    pub cooldown_remaining: Option<Duration>,
    /// Age of the entry `consume` would return next.
    pub oldest_age: Option<Duration>,
    pub counters: PoolCounters,
}

impl PoolSnapshot {
    /// Short state label for display.
    pub fn status(&self) -> &'static str {
        if self.cooldown_remaining.is_some() {
            "cooldown"
        } else if self.is_fetching {
            "fetching"
        } else if self.queued >= self.capacity {
            "full"
        } else {
            "idle"
        }
    }
}

impl fmt::Display for PoolSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {}/{} {} failures={} fetched={}/{} consumed={} expired={}",
            self.key,
            self.kind,
            self.queued,
            self.capacity,
            self.status(),
            self.consecutive_failures,
            self.counters.fetch_successes,
            self.counters.fetches_started,
            self.counters.consumed,
            self.counters.expired,
        )?;
        if let Some(remaining) = self.cooldown_remaining {
            write!(f, " retry_in={:.1}s", remaining.as_secs_f64())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> PoolSnapshot {
        PoolSnapshot {
            key: PoolKey::new("feed"),
            kind: PoolKind::Native,
            queued: 1,
            capacity: 2,
            is_fetching: false,
            consecutive_failures: 0,
            cooldown_remaining: None,
            oldest_age: None,
            counters: PoolCounters::default(),
        }
    }

    #[test]
    fn test_status_labels() {
        let mut s = snapshot();
        assert_eq!(s.status(), "idle");
        s.is_fetching = true;
        assert_eq!(s.status(), "fetching");
        s.is_fetching = false;
        s.queued = 2;
        assert_eq!(s.status(), "full");
        s.cooldown_remaining = Some(Duration::from_secs(3));
        assert_eq!(s.status(), "cooldown");
    }

    #[test]
    fn test_display_includes_cooldown() {
        let mut s = snapshot();
        s.cooldown_remaining = Some(Duration::from_millis(2500));
        let text = s.to_string();
        assert!(text.starts_with("feed (native): 1/2 cooldown"));
        assert!(text.ends_with("retry_in=2.5s"));
    }
}
