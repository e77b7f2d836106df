//! Error types for retry configuration.

/// Error returned when a [`RetryPolicy`](super::RetryPolicy) cannot drive the
/// retry operator.
///
/// Source failures are never wrapped in this type: once retries run out the
/// source's own error value is yielded unchanged.
///
/// # Examples
///
/// ```rust
/// use eddy::{PolicyError, RetryPolicy};
/// use std::time::Duration;
///
/// let policy = RetryPolicy::constant(Duration::from_millis(10));
/// assert_eq!(policy.validate(), Err(PolicyError::Unbounded));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    /// The policy has no `max_retries`, so a failing source would be
    /// resubscribed forever.
    Unbounded,
}

impl std::fmt::Display for PolicyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "retry policy must set max_retries"),
        }
    }
}

impl std::error::Error for PolicyError {}

#[cfg(test)]
mod error_tests {
    use super::*;

    #[test]
    fn test_policy_error_display() {
        let display = format!("{}", PolicyError::Unbounded);
        assert!(display.contains("max_retries"));
    }
}
