//! Breaker error types.

use std::time::Duration;
use thiserror::Error;

/// Error returned by [`CircuitBreaker::call`](super::CircuitBreaker::call).
///
/// The only error the breaker introduces on its own is [`BreakerError::Open`].
/// Operation errors are handed back unchanged inside
/// [`BreakerError::Operation`].
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not invoked.
    #[error("circuit breaker '{name}' is open, retry after {retry_after:?}")]
    Open { name: String, retry_after: Duration },

    /// The operation did not finish within the call timeout.
    #[error("operation on '{name}' timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    /// The operation failed; the original error is untouched.
    #[error(transparent)]
    Operation(E),
}

impl<E> BreakerError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BreakerError::Timeout { .. })
    }

    /// Retry hint carried by an open-circuit rejection.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            BreakerError::Open { retry_after, .. } => Some(*retry_after),
            _ => None,
        }
    }

    /// The operation's own error, if that is what failed.
    pub fn into_operation(self) -> Option<E> {
        match self {
            BreakerError::Operation(err) => Some(err),
            _ => None,
        }
    }
}

/// How a counted failure came about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The operation returned an error the classifier accepted.
    Operation,
    /// The operation overran the call timeout.
    Timeout,
    /// The caller dropped the call while the operation was in flight.
    Cancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Operation => "operation_failure",
            FailureKind::Timeout => "operation_timeout",
            FailureKind::Cancelled => "cancelled",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err: BreakerError<std::io::Error> = BreakerError::Open {
            name: "ads-api".into(),
            retry_after: Duration::from_millis(150),
        };
        assert!(err.to_string().contains("ads-api"));
        assert!(err.is_open());
        assert_eq!(err.retry_after(), Some(Duration::from_millis(150)));

        let err: BreakerError<std::io::Error> =
            BreakerError::Operation(std::io::Error::new(std::io::ErrorKind::Other, "boom"));
        assert_eq!(err.to_string(), "boom");
        assert!(err.into_operation().is_some());
    }
}
