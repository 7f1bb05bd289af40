//! Runtime configuration for consumers and the service host.
//!
//! Numeric settings are validated newtypes, so a config that deserializes or
//! constructs successfully is usable as-is. Cross-field rules (a backoff base above
//! its maximum) are checked by the constructors and reported as [`ConfigError`].

use crate::errors::ConfigError;
use crate::types::{BatchSize, ConsumerGroup};
use nutype::nutype;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default consumer poll interval when a category has nothing new.
pub const DEFAULT_CONSUMER_POLL_INTERVAL_MS: u64 = 500;

/// Default pause between service host iterations.
pub const DEFAULT_HOST_POLL_INTERVAL_MS: u64 = 100;

/// Default first backoff delay after a failed host iteration.
pub const DEFAULT_BACKOFF_BASE_MS: u64 = 500;

/// Default ceiling for the backoff delay.
pub const DEFAULT_BACKOFF_MAXIMUM_MS: u64 = 5_000;

/// Default backoff growth factor.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Pause between polls in milliseconds.
///
/// Zero is allowed and means "poll again immediately".
#[nutype(
    validate(less_or_equal = 3_600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct PollIntervalMs(u64);

impl PollIntervalMs {
    /// Convert to Duration for use with tokio::time::sleep.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// A backoff delay in milliseconds, between 1ms and one hour.
#[nutype(
    validate(greater_or_equal = 1, less_or_equal = 3_600_000),
    derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        PartialOrd,
        Ord,
        Into,
        Serialize,
        Deserialize
    )
)]
pub struct BackoffDelayMs(u64);

impl BackoffDelayMs {
    /// Convert to Duration for use with tokio::time::sleep.
    pub fn as_duration(self) -> Duration {
        Duration::from_millis(self.into())
    }
}

/// Multiplier applied to the backoff delay after each consecutive failure.
#[nutype(
    validate(finite, greater_or_equal = 1.0, less_or_equal = 10.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Into, Serialize, Deserialize)
)]
pub struct BackoffFactor(f64);

/// Exponential backoff settings.
///
/// Deserialization goes through [`BackoffConfig::new`], so a base above the
/// maximum is rejected there as well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BackoffConfigRepr")]
pub struct BackoffConfig {
    /// Delay after the first failure.
    pub base: BackoffDelayMs,
    /// Upper bound for the delay.
    pub maximum: BackoffDelayMs,
    /// Growth factor between consecutive failures.
    pub factor: BackoffFactor,
    /// Spread each delay randomly by ±20%.
    pub jitter: bool,
}

impl BackoffConfig {
    /// Validates and creates a backoff configuration without jitter.
    pub fn new(base_ms: u64, maximum_ms: u64, factor: f64) -> Result<Self, ConfigError> {
        let base = BackoffDelayMs::try_new(base_ms).map_err(|e| invalid("backoff.base", &e))?;
        let maximum =
            BackoffDelayMs::try_new(maximum_ms).map_err(|e| invalid("backoff.maximum", &e))?;
        let factor = BackoffFactor::try_new(factor).map_err(|e| invalid("backoff.factor", &e))?;

        if base > maximum {
            return Err(ConfigError::BackoffRange {
                base_ms,
                maximum_ms,
            });
        }

        Ok(Self {
            base,
            maximum,
            factor,
            jitter: false,
        })
    }

    /// Enables or disables jitter.
    #[must_use]
    pub const fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }
}

#[derive(Deserialize)]
struct BackoffConfigRepr {
    base: u64,
    maximum: u64,
    factor: f64,
    #[serde(default)]
    jitter: bool,
}

impl TryFrom<BackoffConfigRepr> for BackoffConfig {
    type Error = ConfigError;

    fn try_from(repr: BackoffConfigRepr) -> Result<Self, Self::Error> {
        Self::new(repr.base, repr.maximum, repr.factor)
            .map(|config| config.with_jitter(repr.jitter))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_BACKOFF_BASE_MS,
            DEFAULT_BACKOFF_MAXIMUM_MS,
            DEFAULT_BACKOFF_FACTOR,
        )
        .expect("Default backoff configuration should always be valid")
    }
}

/// Service host settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Pause between iterations, after success or failure.
    pub poll_interval: PollIntervalMs,
    /// Backoff applied after a failed iteration.
    pub backoff: BackoffConfig,
}

impl HostConfig {
    /// Creates a host configuration with the default backoff.
    pub fn new(poll_interval_ms: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            poll_interval: PollIntervalMs::try_new(poll_interval_ms)
                .map_err(|e| invalid("host.poll_interval", &e))?,
            backoff: BackoffConfig::default(),
        })
    }

    /// Replaces the backoff settings.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST_POLL_INTERVAL_MS)
            .expect("Default host configuration should always be valid")
    }
}

/// Category consumer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Page size for category reads.
    pub batch_size: BatchSize,
    /// Pause after a poll that found nothing.
    pub poll_interval: PollIntervalMs,
    /// Partition of the category this consumer owns.
    pub consumer_group: Option<ConsumerGroup>,
    /// Only consume messages correlated with this category.
    pub correlation: Option<String>,
    /// Storage-level retrieval condition.
    pub condition: Option<String>,
}

impl ConsumerConfig {
    /// Creates a consumer configuration with the given poll interval.
    pub fn new(poll_interval_ms: u64) -> Result<Self, ConfigError> {
        Ok(Self {
            batch_size: BatchSize::default(),
            poll_interval: PollIntervalMs::try_new(poll_interval_ms)
                .map_err(|e| invalid("consumer.poll_interval", &e))?,
            consumer_group: None,
            correlation: None,
            condition: None,
        })
    }

    /// Sets the page size.
    #[must_use]
    pub const fn with_batch_size(mut self, batch_size: BatchSize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Restricts the consumer to one partition of the category.
    #[must_use]
    pub const fn with_consumer_group(mut self, member: u64, size: u64) -> Self {
        self.consumer_group = Some(ConsumerGroup::new(member, size));
        self
    }

    /// Only consumes messages whose correlation stream is in `category`.
    #[must_use]
    pub fn with_correlation(mut self, category: impl Into<String>) -> Self {
        self.correlation = Some(category.into());
        self
    }

    /// Sets a storage-level retrieval condition.
    #[must_use]
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONSUMER_POLL_INTERVAL_MS)
            .expect("Default consumer configuration should always be valid")
    }
}

fn invalid(field: &'static str, error: &impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: error.to_string(),
    }
}
