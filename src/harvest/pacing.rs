//! Politeness delays between portal requests
//!
//! All waits a run makes on purpose come from here: the jittered gap
//! between catalog sub-items, the fixed gap after a single page, the
//! breaker cooldown window and the login retry backoff.

use crate::config::PacingConfig;
use rand::Rng;
use std::time::Duration;

/// Picks a uniformly random duration in `[min_ms, max_ms]`
///
/// # Example
///
/// ```
/// use campus_harvest::harvest::jitter;
///
/// let d = jitter(2000, 4000);
/// assert!(d.as_millis() >= 2000 && d.as_millis() <= 4000);
/// ```
pub fn jitter(min_ms: u64, max_ms: u64) -> std::time::Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min_ms..=max_ms))
}

/// Sleeps for `duration`, returning immediately for zero
pub async fn pause_for(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Delay policy of one run
#[derive(Debug, Clone)]
pub struct Pacer {
    item_delay_min_ms: u64,
    item_delay_max_ms: u64,
    page_delay_ms: u64,
    login_backoff_ms: u64,
}

impl Pacer {
    pub fn new(config: &PacingConfig) -> Self {
        Self {
            item_delay_min_ms: config.item_delay_min_ms,
            item_delay_max_ms: config.item_delay_max_ms,
            page_delay_ms: config.page_delay_ms,
            login_backoff_ms: config.login_backoff_ms,
        }
    }

    /// Gap between two catalog sub-items
    pub fn item_delay(&self) -> Duration {
        jitter(self.item_delay_min_ms, self.item_delay_max_ms)
    }

    /// Gap after a single-page dataset
    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Backoff before login retry `attempt` (0-based): base, 2x base, 4x base...
    pub fn login_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.login_backoff_ms.saturating_mul(factor))
    }
}
