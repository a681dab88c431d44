use super::types::{Admission, RateLimitConfig, RateStatus};
use crate::error::{ApiError, Result};
use dashmap::DashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// In-memory sliding-window log rate limiter.
///
/// One timestamp log per identity. Admission depends only on the requests
/// inside the trailing window ending at `now`, so a burst straddling a
/// window boundary cannot be admitted twice the way it can with a fixed
/// calendar-bucket counter.
///
/// The map is sharded: the evict-check-append sequence for one identity runs
/// under that identity's shard lock, and requests for distinct identities
/// mostly proceed in parallel.
pub struct SlidingWindowLimiter {
    /// Timestamps of admitted requests per identity, oldest first
    windows: DashMap<String, Vec<Duration>>,
    config: RateLimitConfig,
}

impl SlidingWindowLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        info!(
            max_requests = config.max_requests,
            window_secs = config.window_secs,
            "Rate limiter initialized"
        );
        Self {
            windows: DashMap::new(),
            config,
        }
    }

    /// Admit or reject one request for `identity` at `now`.
    ///
    /// Evicts timestamps that have left the window, then either records `now`
    /// and returns the remaining quota, or rejects with the time until the
    /// oldest in-window request expires. The whole sequence is atomic with
    /// respect to other calls for the same identity.
    pub fn try_acquire(&self, identity: &str, now: Duration) -> Result<Admission> {
        let window = self.config.window();
        let max_requests = self.config.max_requests;

        let mut entry = self.windows.entry(identity.to_string()).or_default();
        let timestamps = entry.value_mut();
        timestamps.retain(|ts| *ts + window > now);

        if (timestamps.len() as u32) < max_requests {
            timestamps.push(now);
            let oldest = timestamps[0];
            let remaining = max_requests - timestamps.len() as u32;
            debug!(identity, remaining, "rate limit check passed");
            return Ok(Admission {
                remaining,
                reset_at: oldest + window,
            });
        }

        let retry_after = timestamps
            .first()
            .map(|oldest| (*oldest + window).saturating_sub(now))
            .unwrap_or(window);
        let emptied = timestamps.is_empty();
        drop(entry);
        if emptied {
            self.windows.remove_if(identity, |_, log| log.is_empty());
        }

        let retry_after = as_ceil_secs(retry_after);
        warn!(identity, retry_after, "rate limit exceeded");
        Err(ApiError::RateLimited { retry_after })
    }

    /// Read-only snapshot of `identity`'s window at `now`.
    ///
    /// Performs the same eviction as `try_acquire` but never consumes quota
    /// and never denies.
    pub fn status(&self, identity: &str, now: Duration) -> RateStatus {
        let window = self.config.window();
        let max_requests = self.config.max_requests;

        let mut used = 0;
        let mut oldest = None;
        if let Some(mut entry) = self.windows.get_mut(identity) {
            let timestamps = entry.value_mut();
            timestamps.retain(|ts| *ts + window > now);
            used = timestamps.len() as u32;
            oldest = timestamps.first().copied();
        }
        if used == 0 {
            // A window emptied by eviction is dropped so the map does not
            // grow with every identity ever seen.
            self.windows.remove_if(identity, |_, log| log.is_empty());
        }

        RateStatus {
            limit: max_requests,
            used,
            remaining: max_requests.saturating_sub(used),
            reset_at: oldest.map(|ts| ts + window).unwrap_or(now),
        }
    }

    pub fn limit(&self) -> u32 {
        self.config.max_requests
    }

    /// Number of identities currently holding a window (for testing/monitoring)
    pub fn active_identities(&self) -> usize {
        self.windows.len()
    }
}

/// Seconds, rounding any fraction up so callers never retry early.
fn as_ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
