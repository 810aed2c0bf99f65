//! Wait policy for the sync completion loop.

use crate::constants::{
    DEFAULT_SYNC_MAX_WAIT_SECS, DEFAULT_SYNC_POLL_INTERVAL_MS, DEFAULT_SYNC_POLL_JITTER_MS,
};
use rand::Rng;
use std::time::Duration;

/// How long to wait between sync steps, and for how long overall
///
/// `max_wait` of `None` leaves the loop bounded only by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub jitter: Duration,
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_SYNC_POLL_INTERVAL_MS),
            jitter: Duration::from_millis(DEFAULT_SYNC_POLL_JITTER_MS),
            max_wait: (DEFAULT_SYNC_MAX_WAIT_SECS > 0)
                .then(|| Duration::from_secs(DEFAULT_SYNC_MAX_WAIT_SECS)),
        }
    }
}

impl PollPolicy {
    #[must_use]
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    /// Interval plus a random share of the jitter
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.interval;
        }
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        self.interval + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}
