//! Slow-response circuit breaker
//!
//! A run of slow responses is taken as a sign the portal is throttling us.
//! After `slow_streak` consecutive responses slower than `slow_response_ms`
//! the breaker asks for one cooldown sleep drawn from the configured window
//! and starts counting again. A single fast response clears the streak.

use crate::config::ClientConfig;
use crate::harvest::pacing::jitter;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SlowResponseBreaker {
    slow: Duration,
    fast: Duration,
    streak: u32,
    cooldown_min_ms: u64,
    cooldown_max_ms: u64,
    consecutive_slow: u32,
}

impl SlowResponseBreaker {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            slow: Duration::from_millis(config.slow_response_ms),
            fast: Duration::from_millis(config.fast_response_ms),
            streak: config.slow_streak.max(1),
            cooldown_min_ms: config.cooldown_min_ms,
            cooldown_max_ms: config.cooldown_max_ms,
            consecutive_slow: 0,
        }
    }

    /// Feeds one response time into the breaker
    ///
    /// # Returns
    ///
    /// * `Some(cooldown)` - The streak was reached; sleep this long before the next request
    /// * `None` - Keep going
    pub fn observe(&mut self, elapsed: Duration) -> Option<Duration> {
        if elapsed > self.slow {
            self.consecutive_slow += 1;
            if self.consecutive_slow >= self.streak {
                self.consecutive_slow = 0;
                return Some(jitter(self.cooldown_min_ms, self.cooldown_max_ms));
            }
        } else if elapsed < self.fast {
            self.consecutive_slow = 0;
        }
        None
    }

    /// Returns true if `elapsed` counts as a slow response
    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.slow
    }

    pub fn consecutive_slow(&self) -> u32 {
        self.consecutive_slow
    }
}
