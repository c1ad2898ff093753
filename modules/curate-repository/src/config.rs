use std::time::Duration;

use curate_common::Config;
use curate_store::MAX_BATCH_WRITE_ITEMS;
use rand::Rng;

/// Tuning for `write_batch`.
#[derive(Debug, Clone)]
pub struct BatchWriteConfig {
    /// Items per store call. Never above the store maximum.
    pub chunk_size: usize,
    /// Submissions per chunk, first one included.
    pub max_attempts: u32,
    /// Base pause between rounds of one chunk; grows linearly per round.
    pub backoff: Duration,
    /// Chunks in flight at once.
    pub concurrency: usize,
}

impl Default for BatchWriteConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_BATCH_WRITE_ITEMS,
            max_attempts: 5,
            backoff: Duration::from_millis(50),
            concurrency: 4,
        }
    }
}

impl From<&Config> for BatchWriteConfig {
    fn from(config: &Config) -> Self {
        Self {
            chunk_size: config.batch_write_size.clamp(1, MAX_BATCH_WRITE_ITEMS),
            max_attempts: config.batch_write_max_attempts.max(1),
            backoff: Duration::from_millis(config.batch_write_backoff_ms),
            concurrency: config.write_concurrency.max(1),
        }
    }
}

/// Bounded retry for interactive updates that lose an optimistic-concurrency
/// race: `max_attempts` tries in total, with a random pause in
/// `[0, max_jitter]` between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    /// A single attempt, no retry.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            max_jitter: Duration::ZERO,
        }
    }

    pub(crate) fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_jitter: Duration::from_millis(50),
        }
    }
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_attempts: config.update_max_attempts.max(1),
            max_jitter: Duration::from_millis(config.update_jitter_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_size_never_exceeds_store_limit() {
        let config = Config {
            batch_write_size: 100,
            ..Config::default()
        };
        assert_eq!(BatchWriteConfig::from(&config).chunk_size, MAX_BATCH_WRITE_ITEMS);
    }

    #[test]
    fn jitter_stays_within_bound() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            assert!(policy.jitter() <= policy.max_jitter);
        }
        assert_eq!(RetryPolicy::once().jitter(), Duration::ZERO);
    }
}
