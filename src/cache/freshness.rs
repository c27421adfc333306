//! Cache freshness policy

use chrono::{DateTime, Duration, Utc};

/// Largest TTL chrono can represent as a `Duration`
const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

/// Returns true if an entry written at `entry_timestamp` is still valid at `now`
///
/// Fresh means strictly less than `ttl` has elapsed: an entry exactly `ttl`
/// old is stale.
pub fn is_fresh(entry_timestamp: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    now - entry_timestamp < ttl
}

/// TTL applied to cached lookups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    ttl: Duration,
}

impl FreshnessPolicy {
    /// Creates a policy with the given TTL
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Creates a policy from a TTL in seconds, clamped to what chrono can hold
    pub fn from_secs(ttl_secs: u64) -> Self {
        Self::new(Duration::seconds(ttl_secs.min(MAX_TTL_SECS) as i64))
    }

    /// Configured TTL
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Entries written after this instant are fresh at `now`
    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_sub_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Same as the free `is_fresh`, using this policy's TTL
    pub fn is_fresh(&self, entry_timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        is_fresh(entry_timestamp, now, self.ttl)
    }
}
