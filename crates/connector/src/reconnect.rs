//! Reconnection policy
//!
//! Exponential backoff without jitter: consecutive delays never decrease.

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Multiplier applied after each attempt.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            multiplier: 2.0,
        }
    }
}

#[derive(Debug)]
pub struct ReconnectPolicy {
    config: ReconnectConfig,
    current_delay: Duration,
    attempt_count: u32,
}

impl ReconnectPolicy {
    pub fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay.min(config.max_delay);
        Self {
            config,
            current_delay: initial_delay,
            attempt_count: 0,
        }
    }

    /// Delay to wait before the next attempt. Attempts are unbounded.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt_count = self.attempt_count.saturating_add(1);
        let delay = self.current_delay;

        let scaled = self.current_delay.as_secs_f64() * self.config.multiplier;
        self.current_delay = if scaled.is_finite() && scaled > 0.0 {
            Duration::from_secs_f64(scaled.min(self.config.max_delay.as_secs_f64()))
        } else {
            self.config.max_delay
        };

        delay
    }

    /// Reset after a session reached streaming.
    pub fn reset(&mut self) {
        self.current_delay = self.config.initial_delay.min(self.config.max_delay);
        self.attempt_count = 0;
    }

    /// Attempts made since the last reset (1-based once an attempt was scheduled)
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }
}
