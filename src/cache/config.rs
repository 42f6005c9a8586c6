//! Cache sizing and expiry.

use std::time::Duration;

/// Bounds for one cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_capacity: u64,

    /// Evict entries this long after their last write.
    pub ttl: Option<Duration>,

    /// Evict entries nobody read or wrote for this long.
    pub tti: Option<Duration>,
}

impl CacheConfig {
    /// Capacity-bounded only, no expiry.
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ttl: None,
            tti: None,
        }
    }

    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    #[must_use]
    pub fn tti(mut self, duration: Duration) -> Self {
        self.tti = Some(duration);
        self
    }

    /// Per-sender state such as flood records. Idle expiry must stay well
    /// above the flood window so eviction never changes a verdict.
    pub fn sender_state() -> Self {
        Self::with_capacity(100_000)
            .ttl(Duration::from_secs(3600))
            .tti(Duration::from_secs(600))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_state_outlives_flood_window() {
        let config = CacheConfig::sender_state();

        assert!(config.tti.unwrap() > Duration::from_secs(60));
        assert!(config.ttl.unwrap() >= config.tti.unwrap());
    }

    #[test]
    fn test_with_capacity_has_no_expiry() {
        let config = CacheConfig::with_capacity(5);

        assert_eq!(config.max_capacity, 5);
        assert!(config.ttl.is_none() && config.tti.is_none());
    }
}
