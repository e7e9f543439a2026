//! Reconnection logic for the feed connection.

use crate::config::millis;
use rand::Rng;
use serde::Deserialize;
use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Whether reconnection is enabled.
    pub enabled: bool,
    /// Initial delay before first reconnect attempt.
    #[serde(rename = "initial_delay_ms", deserialize_with = "millis")]
    pub initial_delay: Duration,
    /// Maximum delay between reconnect attempts.
    #[serde(rename = "max_delay_ms", deserialize_with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
    /// Relative jitter applied to every delay (0.2 = +/-20%).
    pub jitter: f64,
    /// Maximum number of reconnect attempts (0 = unlimited).
    pub max_attempts: usize,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.2,
            max_attempts: 0,
        }
    }
}

/// Tracks reconnection state and calculates delays.
#[derive(Debug)]
pub struct ReconnectState {
    config: ReconnectConfig,
    attempts: usize,
    current_delay: Duration,
}

impl ReconnectState {
    /// Creates a new reconnect state with the given configuration.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            attempts: 0,
            current_delay: initial_delay,
        }
    }

    /// Records a failed connection attempt and returns the delay before next attempt.
    ///
    /// Returns `None` if max attempts reached or reconnection is disabled.
    pub fn on_failure(&mut self) -> Option<Duration> {
        if !self.config.enabled {
            return None;
        }

        self.attempts += 1;

        if self.config.max_attempts > 0 && self.attempts >= self.config.max_attempts {
            return None;
        }

        let delay = self.current_delay;

        let next_secs = self.current_delay.as_secs_f64() * self.config.backoff_multiplier.max(1.0);
        self.current_delay = Duration::try_from_secs_f64(next_secs)
            .map_or(self.config.max_delay, |next| next.min(self.config.max_delay));

        Some(self.jittered(delay))
    }

    /// Resets the reconnection state once a connection has proven healthy.
    pub fn on_success(&mut self) {
        self.attempts = 0;
        self.current_delay = self.config.initial_delay;
    }

    /// Returns the number of reconnection attempts made.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }

    /// Returns true if more reconnection attempts are allowed.
    #[must_use]
    pub fn can_retry(&self) -> bool {
        self.config.enabled
            && (self.config.max_attempts == 0 || self.attempts < self.config.max_attempts)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        let jitter = self.config.jitter.clamp(0.0, 1.0);
        if jitter <= 0.0 {
            return delay;
        }
        let factor = rand::thread_rng().gen_range((1.0 - jitter)..=(1.0 + jitter));
        delay.mul_f64(factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_attempts: usize) -> ReconnectConfig {
        ReconnectConfig {
            enabled: true,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: 0.0,
            max_attempts,
        }
    }

    #[test]
    fn test_reconnect_backoff_caps() {
        let mut state = ReconnectState::new(config(0));

        let delays: Vec<u64> = (0..7)
            .map(|_| state.on_failure().unwrap().as_secs())
            .collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 30, 30]);
        assert!(state.can_retry());
    }

    #[test]
    fn test_reconnect_max_attempts() {
        let mut state = ReconnectState::new(config(2));

        assert!(state.on_failure().is_some());
        assert!(state.on_failure().is_none());
        assert!(!state.can_retry());
    }

    #[test]
    fn test_reconnect_reset() {
        let mut state = ReconnectState::new(config(0));

        state.on_failure();
        state.on_failure();
        assert_eq!(state.attempts(), 2);

        state.on_success();
        assert_eq!(state.attempts(), 0);
        assert_eq!(state.on_failure(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_huge_multiplier_caps_delay() {
        for multiplier in [f64::MAX, f64::INFINITY] {
            let mut state = ReconnectState::new(ReconnectConfig {
                backoff_multiplier: multiplier,
                ..config(0)
            });
            assert_eq!(state.on_failure(), Some(Duration::from_secs(1)));
            assert_eq!(state.on_failure(), Some(Duration::from_secs(30)));
            assert_eq!(state.on_failure(), Some(Duration::from_secs(30)));
        }
    }

    #[test]
    fn test_reconnect_disabled() {
        let mut state = ReconnectState::new(ReconnectConfig {
            enabled: false,
            ..Default::default()
        });
        assert!(state.on_failure().is_none());
    }

    #[test]
    fn test_jitter_bounds() {
        let mut state = ReconnectState::new(ReconnectConfig {
            max_delay: Duration::from_secs(1),
            ..Default::default()
        });
        for _ in 0..100 {
            let delay = state.on_failure().unwrap();
            assert!(delay >= Duration::from_millis(799), "{delay:?}");
            assert!(delay <= Duration::from_millis(1201), "{delay:?}");
        }
    }

    #[test]
    fn test_deserialize_defaults() {
        let config: ReconnectConfig =
            serde_json::from_str(r#"{"initial_delay_ms": 250, "max_attempts": 3}"#).unwrap();
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert_eq!(config.max_attempts, 3);
        assert!(config.enabled);
    }
}
