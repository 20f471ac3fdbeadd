use std::time::Duration;

/// Configuration for reconnection behavior
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt
    pub initial_delay: Duration,
    /// Ceiling on the delay between reconnection attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Maximum number of reconnection attempts (None = retry forever)
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30),
            multiplier: 1.5,
            max_attempts: Some(5),
        }
    }
}

/// Exponential backoff calculator
#[derive(Debug, Clone)]
pub(crate) struct ExponentialBackoff {
    initial_delay: Duration,
    current_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    pub(crate) fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            current_delay: initial_delay,
            max_delay,
            multiplier,
        }
    }

    pub(crate) fn from_config(config: &ReconnectConfig) -> Self {
        Self::new(config.initial_delay, config.max_delay, config.multiplier)
    }

    /// Get the next delay duration
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.current_delay;
        self.current_delay = std::cmp::min(
            Duration::from_secs_f64(delay.as_secs_f64() * self.multiplier),
            self.max_delay,
        );
        delay
    }

    /// Reset the backoff to the initial delay
    pub(crate) fn reset(&mut self) {
        self.current_delay = self.initial_delay;
    }
}
