//! Reconnect backoff.
//!
//! Bounded exponential backoff with jitter, and an explicit cap on the
//! number of retries.
//!
//! ```text
//! retry n delay = min(initial * multiplier^(n-1), max_delay) * (1 ± jitter)
//! ```
//!
//! The jittered delay is clamped to `max_delay` as well.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;


use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default delay before the first retry.
const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

/// Default upper bound for any delay.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Default growth factor.
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// Default jitter ratio (±20%).
const DEFAULT_JITTER: f64 = 0.2;

/// Default retry budget.
const DEFAULT_MAX_ATTEMPTS: u32 = 10;

// ============================================================================
// ReconnectPolicy
// ============================================================================

/// How a session retries after losing its connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    initial_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: f64,
    max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: DEFAULT_INITIAL_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            multiplier: DEFAULT_MULTIPLIER,
            jitter: DEFAULT_JITTER,
            max_attempts: Some(DEFAULT_MAX_ATTEMPTS),
        }
    }
}

impl ReconnectPolicy {
    /// Exponential policy from `initial_delay` up to `max_delay`, with the
    /// default multiplier, jitter and retry budget.
    #[must_use]
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            max_delay,
            ..Self::default()
        }
    }

    /// Constant delay, no jitter.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            multiplier: 1.0,
            jitter: 0.0,
            ..Self::default()
        }
    }

    /// Sets the growth factor.
    #[must_use]
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the jitter ratio (`0.0` disables jitter).
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    /// Gives up after `attempts` consecutive failed retries.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Retries forever.
    #[must_use]
    pub fn unlimited(mut self) -> Self {
        self.max_attempts = None;
        self
    }

    /// Returns the retry budget (`None` = unlimited).
    #[inline]
    #[must_use]
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Returns the delay cap.
    #[inline]
    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Returns the jitter ratio.
    #[inline]
    #[must_use]
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Un-jittered delay before retry `attempt` (1-based).
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.powi(exponent);
        let secs = self.initial_delay.as_secs_f64() * factor;

        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// Checks the policy for nonsensical values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(Error::config("reconnect initial delay must be non-zero"));
        }
        if self.max_delay < self.initial_delay {
            return Err(Error::config(
                "reconnect max delay must not be below the initial delay",
            ));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::config("reconnect multiplier must be at least 1.0"));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(Error::config("reconnect jitter must be within 0.0..=1.0"));
        }
        Ok(())
    }
}

// ============================================================================
// Backoff
// ============================================================================

/// Retry counter driven by a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempts: u32,
}

impl Backoff {
    /// Creates a counter with no retries used.
    #[must_use]
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            attempts: 0,
        }
    }

    /// Consumes one retry and returns how long to wait before it.
    ///
    /// Returns `None` once the retry budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if let Some(max) = self.policy.max_attempts
            && self.attempts >= max
        {
            return None;
        }

        self.attempts += 1;
        Some(self.jittered(self.policy.base_delay(self.attempts)))
    }

    /// Starts over after a successful connection.
    #[inline]
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    /// Retries consumed since the last reset.
    #[inline]
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    fn jittered(&self, base: Duration) -> Duration {
        if self.policy.jitter <= 0.0 {
            return base;
        }

        // Uniform in [1 - jitter, 1 + jitter).
        let factor = 1.0 + self.policy.jitter * (2.0 * rand::random::<f64>() - 1.0);
        let secs = (base.as_secs_f64() * factor).max(0.0);
        Duration::from_secs_f64(secs).min(self.policy.max_delay)
    }
}

// ============================================================================
// Tests
// ============================================================================
