use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Rate limit configuration, applied per identity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum number of requests allowed inside the window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    /// Length of the sliding window (in seconds)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// Get the window as a Duration
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_max_requests() -> u32 {
    10
}

fn default_window_secs() -> u64 {
    60
}

/// Quota granted to one admitted request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// Requests left in the window after this one
    pub remaining: u32,
    /// Instant (since the Unix epoch) when the oldest in-window request
    /// leaves the window
    pub reset_at: Duration,
}

/// Read-only snapshot of an identity's window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateStatus {
    pub limit: u32,
    pub used: u32,
    pub remaining: u32,
    /// Instant (since the Unix epoch) when the window next frees a slot;
    /// equals the query time for an empty window
    pub reset_at: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_config_defaults() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 10);
        assert_eq!(config.window_secs, 60);
        assert_eq!(config.window(), Duration::from_secs(60));
    }

    #[test]
    fn test_rate_limit_config_from_yaml() {
        let config: RateLimitConfig = serde_yaml::from_str("max_requests: 3").unwrap();
        assert_eq!(config.max_requests, 3);
        assert_eq!(config.window_secs, 60);
    }
}
