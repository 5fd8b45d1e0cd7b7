//! Rate limiter configuration

use crate::error::{LimiterError, LimiterResult};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Outcome of a single acquire/reserve call, handed to a [`Configuration`]'s
/// `drain_on_result` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Permits were granted (immediately or after waiting).
    Granted,
    /// Permits could not be granted within the configured timeout.
    Refused,
}

/// A predicate evaluated after every acquire/reserve call; when it returns
/// `true` the limiter drains its remaining balance to zero.
pub type DrainPredicate = Arc<dyn Fn(Outcome) -> bool + Send + Sync>;

/// Immutable configuration triple: refresh period, permits per period, and
/// the default wait a caller is willing to tolerate.
///
/// Configuration is a value type. `change_timeout`/`change_limit_for_period`
/// on [`crate::limiter::RateLimiter`] never mutate a `Configuration` in
/// place — they install a new one via the same CAS path that updates permit
/// accounting (see `crate::algorithm`).
#[derive(Clone)]
pub struct Configuration {
    refresh_period_nanos: u64,
    limit_per_period: i64,
    acquire_timeout_nanos: u64,
    drain_on_result: Option<DrainPredicate>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("refresh_period_nanos", &self.refresh_period_nanos)
            .field("limit_per_period", &self.limit_per_period)
            .field("acquire_timeout_nanos", &self.acquire_timeout_nanos)
            .field("drain_on_result", &self.drain_on_result.is_some())
            .finish()
    }
}

impl Configuration {
    /// Start building a configuration from documented defaults:
    /// `refresh_period = 100ms`, `limit_per_period = 50`, `acquire_timeout = 0`.
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Refresh period, in nanoseconds.
    pub fn refresh_period_nanos(&self) -> u64 {
        self.refresh_period_nanos
    }

    /// Permits granted per refresh period.
    pub fn limit_per_period(&self) -> i64 {
        self.limit_per_period
    }

    /// Default timeout a caller is willing to wait, in nanoseconds.
    pub fn acquire_timeout_nanos(&self) -> u64 {
        self.acquire_timeout_nanos
    }

    /// Evaluate the drain-on-result predicate, if one is configured.
    pub fn should_drain(&self, outcome: Outcome) -> bool {
        self.drain_on_result
            .as_ref()
            .is_some_and(|pred| pred(outcome))
    }

    /// Return a copy of this configuration with a new acquire timeout.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            acquire_timeout_nanos: timeout.as_nanos() as u64,
            ..self.clone()
        }
    }

    /// Return a copy of this configuration with a new limit-per-period.
    pub fn with_limit_per_period(&self, limit: i64) -> LimiterResult<Self> {
        if limit < 1 {
            return Err(LimiterError::InvalidLimitPerPeriod { limit });
        }
        Ok(Self {
            limit_per_period: limit,
            ..self.clone()
        })
    }
}

/// Builder for [`Configuration`], validating on [`ConfigurationBuilder::build`].
pub struct ConfigurationBuilder {
    refresh_period: Duration,
    limit_per_period: i64,
    acquire_timeout: Duration,
    drain_on_result: Option<DrainPredicate>,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self {
            refresh_period: Duration::from_millis(100),
            limit_per_period: 50,
            acquire_timeout: Duration::ZERO,
            drain_on_result: None,
        }
    }
}

impl ConfigurationBuilder {
    /// Set the refresh period. Must be at least 1ns.
    pub fn refresh_period(mut self, period: Duration) -> Self {
        self.refresh_period = period;
        self
    }

    /// Set the number of permits granted per refresh period. Must be at least 1.
    pub fn limit_per_period(mut self, limit: i64) -> Self {
        self.limit_per_period = limit;
        self
    }

    /// Set the default duration a caller is willing to wait for permits.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Install a predicate evaluated after every acquire/reserve call; when
    /// it returns `true` the limiter's remaining balance is drained to zero.
    pub fn drain_on_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(Outcome) -> bool + Send + Sync + 'static,
    {
        self.drain_on_result = Some(Arc::new(predicate));
        self
    }

    /// Validate and construct the configuration.
    pub fn build(self) -> LimiterResult<Configuration> {
        let nanos = self.refresh_period.as_nanos();
        if nanos == 0 {
            return Err(LimiterError::InvalidRefreshPeriod { nanos: 0 });
        }
        let refresh_period_nanos = nanos.min(u64::MAX as u128) as u64;

        if self.limit_per_period < 1 {
            return Err(LimiterError::InvalidLimitPerPeriod {
                limit: self.limit_per_period,
            });
        }

        Ok(Configuration {
            refresh_period_nanos,
            limit_per_period: self.limit_per_period,
            acquire_timeout_nanos: self.acquire_timeout.as_nanos().min(u64::MAX as u128) as u64,
            drain_on_result: self.drain_on_result,
        })
    }
}
