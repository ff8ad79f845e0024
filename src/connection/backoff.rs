//! Reconnection delay schedule.

use std::time::Duration;

use rand::Rng;

/// Reconnect backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Delay schedule in milliseconds; the final entry repeats
    pub delays_ms: Vec<u64>,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            delays_ms: vec![0, 2_000, 5_000, 10_000, 30_000],
            jitter_factor: 0.0,
        }
    }
}

/// Walks a fixed delay schedule, repeating the final interval, with
/// optional jitter.
pub struct ReconnectBackoff {
    config: BackoffConfig,
    attempt: u32,
}

impl ReconnectBackoff {
    pub fn new() -> Self {
        Self::with_config(BackoffConfig::default())
    }

    pub fn with_config(config: BackoffConfig) -> Self {
        Self { config, attempt: 0 }
    }

    /// Get the next delay duration
    pub fn next_delay(&mut self) -> Duration {
        let index = (self.attempt as usize).min(self.config.delays_ms.len().saturating_sub(1));
        self.attempt = self.attempt.saturating_add(1);

        let base = self.config.delays_ms.get(index).copied().unwrap_or(0);
        if base == 0 || self.config.jitter_factor <= 0.0 {
            return Duration::from_millis(base);
        }

        let jitter_range = base as f64 * self.config.jitter_factor;
        let jitter = rand::rng().random_range(-jitter_range..jitter_range);
        Duration::from_millis((base as f64 + jitter).max(1.0) as u64)
    }

    /// Reset the schedule to its first entry
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of delays handed out since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_walks_in_order_then_repeats_final() {
        let config = BackoffConfig {
            delays_ms: vec![0, 2_000, 5_000],
            jitter_factor: 0.0,
        };
        let mut backoff = ReconnectBackoff::with_config(config);

        assert_eq!(backoff.next_delay(), Duration::from_millis(0));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2_000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(5_000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(5_000));
        assert_eq!(backoff.next_delay(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_reset_returns_to_first_entry() {
        let config = BackoffConfig {
            delays_ms: vec![100, 200],
            jitter_factor: 0.0,
        };
        let mut backoff = ReconnectBackoff::with_config(config);

        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let config = BackoffConfig {
            delays_ms: vec![1_000],
            jitter_factor: 0.5,
        };
        let mut backoff = ReconnectBackoff::with_config(config);

        for _ in 0..50 {
            let delay = backoff.next_delay().as_millis() as u64;
            assert!((500..=1_500).contains(&delay), "delay out of range: {delay}");
        }
    }

    #[test]
    fn test_empty_schedule_yields_zero() {
        let config = BackoffConfig {
            delays_ms: vec![],
            jitter_factor: 0.0,
        };
        let mut backoff = ReconnectBackoff::with_config(config);
        assert_eq!(backoff.next_delay(), Duration::from_millis(0));
    }
}
