use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Exponential backoff state.
///
/// The first delay after a reset is the base; each further delay multiplies the
/// previous one by the factor, capped at the maximum. Jitter, when enabled, spreads
/// the returned delay without affecting the progression.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    config: BackoffConfig,
    current: Option<Duration>,
}

impl Backoff {
    /// Creates a backoff in its reset state.
    pub const fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            current: None,
        }
    }

    /// Advances the backoff and returns the delay to sleep.
    pub fn next_delay(&mut self) -> Duration {
        let maximum = self.config.maximum.as_duration();
        let next = match self.current {
            None => self.config.base.as_duration(),
            Some(current) => {
                let grown = current.as_millis() as f64 * self.config.factor.into_inner();
                Duration::from_millis(grown as u64).min(maximum)
            }
        };
        self.current = Some(next);

        if self.config.jitter {
            add_jitter(next)
        } else {
            next
        }
    }

    /// Returns to the reset state; the next delay is the base again.
    pub fn reset(&mut self) {
        self.current = None;
    }

    /// The last delay handed out since the reset, before jitter.
    pub const fn current(&self) -> Option<Duration> {
        self.current
    }

    /// The settings this backoff follows.
    pub const fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

fn add_jitter(delay: Duration) -> Duration {
    let jitter_factor = rand::rng().random_range(0.8..1.2);
    let jittered_ms = (delay.as_millis() as f64 * jitter_factor) as u64;
    Duration::from_millis(jittered_ms)
}
