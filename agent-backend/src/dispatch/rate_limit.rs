//! Per-org sliding-window admission control
//!
//! Advisory throttling ahead of any persistence or agent invocation. State is
//! in-memory and per-process: running several instances yields independent
//! quotas, which is an accepted approximation rather than a hard guarantee.

use dashmap::DashMap;
use std::time::{Duration, Instant};

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    /// Timestamps of prior allowed calls, per org. Keys accumulate for the
    /// life of the process; entries inside a key are evicted lazily.
    windows: DashMap<String, Vec<Instant>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: DashMap::new(),
        }
    }

    /// Admit or reject one request for `org_id`. Denied attempts are not
    /// recorded, so a throttled client does not extend its own penalty.
    /// This operation cannot fail.
    pub fn allow(&self, org_id: &str) -> bool {
        self.allow_at(org_id, Instant::now())
    }

    pub(crate) fn allow_at(&self, org_id: &str, now: Instant) -> bool {
        let mut entry = self.windows.entry(org_id.to_string()).or_default();
        entry.retain(|t| now.duration_since(*t) < self.window);

        if entry.len() >= self.max_requests {
            log::warn!(
                "[RATE] org {} throttled: {} requests in window",
                org_id,
                entry.len()
            );
            return false;
        }

        entry.push(now);
        true
    }
}
