//! Timeout enforcement.
//!
//! Wraps an operation future in a tokio deadline and folds the two layers of
//! `Result` into a single outcome, so a call resolves to exactly one of
//! completed, failed, or timed out. When the deadline fires the operation
//! future is dropped and can no longer produce a result.

use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Result of running an operation under a deadline.
#[derive(Debug)]
pub enum Deadline<T, E> {
    Completed(T),
    Failed(E),
    TimedOut,
}

/// Run `fut` for at most `limit`.
pub async fn with_deadline<T, E, Fut>(limit: Duration, fut: Fut) -> Deadline<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match time::timeout(limit, fut).await {
        Ok(Ok(value)) => Deadline::Completed(value),
        Ok(Err(err)) => Deadline::Failed(err),
        Err(_) => Deadline::TimedOut,
    }
}
