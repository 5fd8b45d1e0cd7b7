//! Error types for rate limiter configuration

use thiserror::Error;

/// Errors that can occur while constructing or reconfiguring a rate limiter.
///
/// Runtime capacity exhaustion is *not* an error — it is reported through the
/// return values of [`crate::limiter::RateLimiter::acquire`] and
/// [`crate::limiter::RateLimiter::reserve`]. Only configuration construction
/// fails loudly.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LimiterError {
    /// `refresh_period` was zero.
    #[error("refresh_period must be at least 1ns, got {nanos}ns")]
    InvalidRefreshPeriod {
        /// The rejected value, in nanoseconds.
        nanos: u64,
    },

    /// `limit_per_period` was less than 1.
    #[error("limit_per_period must be at least 1, got {limit}")]
    InvalidLimitPerPeriod {
        /// The rejected value.
        limit: i64,
    },
}

/// Result type for rate limiter configuration operations.
pub type LimiterResult<T> = Result<T, LimiterError>;
