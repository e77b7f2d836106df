//! Retry policy types and configuration.

use std::time::Duration;

use super::error::PolicyError;

/// A retry policy describing how a failed source is resubscribed.
///
/// Policies are pure data - they describe retry behavior but don't execute it.
/// The [`RetryWithBackoff`](super::RetryWithBackoff) operator consults the
/// policy after every failure.
///
/// # Bounds
///
/// A policy used by the operator MUST carry `max_retries`. The cap is what
/// makes a failing stream terminate; [`RetryPolicy::validate`] rejects
/// policies without one.
///
/// # Examples
///
/// ```rust
/// use eddy::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::exponential(Duration::from_millis(20))
///     .with_max_retries(3);
///
/// assert_eq!(policy.max_retries(), Some(3));
/// assert!(policy.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    strategy: RetryStrategy,
    max_retries: Option<u32>,
    max_delay: Option<Duration>,
}

/// The backoff strategy for retry delays.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RetryStrategy {
    /// Fixed delay between attempts.
    Constant(Duration),
    /// Delay increases linearly: base * (attempt + 1).
    Linear {
        /// Base delay duration.
        base: Duration,
    },
    /// Delay doubles: base * 2^attempt.
    Exponential {
        /// Base delay duration.
        base: Duration,
    },
}

/// Information about a failed attempt, passed to retry hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, E> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// The error from the failed attempt.
    pub error: &'a E,
    /// Delay before the next subscription, `None` when giving up.
    pub next_delay: Option<Duration>,
    /// Time since the stream was first polled.
    pub elapsed: Duration,
}

impl RetryPolicy {
    /// Create a policy with constant delay between retries.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::constant(Duration::from_millis(500))
    ///     .with_max_retries(2);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(2), None);
    /// ```
    pub fn constant(delay: Duration) -> Self {
        Self::from_strategy(RetryStrategy::Constant(delay))
    }

    /// Create a policy with linearly increasing delay.
    ///
    /// Delay = base * (attempt + 1)
    pub fn linear(base: Duration) -> Self {
        Self::from_strategy(RetryStrategy::Linear { base })
    }

    /// Create a policy with exponentially increasing delay.
    ///
    /// Delay = base * 2^attempt
    ///
    /// # Examples
    ///
    /// ```rust
    /// use eddy::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(20))
    ///     .with_max_retries(3);
    ///
    /// assert_eq!(policy.delay_for_attempt(0), Some(Duration::from_millis(20)));
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(40)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(80)));
    /// assert_eq!(policy.delay_for_attempt(3), None);
    /// ```
    pub fn exponential(base: Duration) -> Self {
        Self::from_strategy(RetryStrategy::Exponential { base })
    }

    fn from_strategy(strategy: RetryStrategy) -> Self {
        Self {
            strategy,
            max_retries: None,
            max_delay: None,
        }
    }

    /// Set the maximum number of retries.
    ///
    /// This does not include the initial subscription: `with_max_retries(3)`
    /// means up to 4 subscriptions in total.
    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Cap every computed delay at `d`.
    ///
    /// ```rust
    /// use eddy::RetryPolicy;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::exponential(Duration::from_millis(100))
    ///     .with_max_retries(10)
    ///     .with_max_delay(Duration::from_millis(300));
    ///
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(200)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(300)));
    /// ```
    pub fn with_max_delay(mut self, d: Duration) -> Self {
        self.max_delay = Some(d);
        self
    }

    /// Get the maximum number of retries.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Get the maximum delay cap.
    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Get the retry strategy.
    pub fn strategy(&self) -> &RetryStrategy {
        &self.strategy
    }

    /// Calculate the delay before retry N (0-indexed).
    ///
    /// Returns `None` once `attempt` reaches `max_retries`, meaning the
    /// failure must be propagated instead of retried.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if let Some(max) = self.max_retries {
            if attempt >= max {
                return None;
            }
        }

        let delay = match &self.strategy {
            RetryStrategy::Constant(d) => *d,
            RetryStrategy::Linear { base } => base.saturating_mul(attempt.saturating_add(1)),
            RetryStrategy::Exponential { base } => {
                base.saturating_mul(2u32.saturating_pow(attempt))
            }
        };

        Some(match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        })
    }

    /// Check that the policy terminates.
    pub fn validate(&self) -> Result<(), PolicyError> {
        match self.max_retries {
            Some(_) => Ok(()),
            None => Err(PolicyError::Unbounded),
        }
    }
}
