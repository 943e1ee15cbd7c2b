//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound TLS negotiation and every session read/write
//! - Leave behavior untouched when no limit is configured
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors
//! - A timed-out connection is closed without a response

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// An operation did not complete within its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation timed out after {0:?}")]
pub struct TimedOut(pub Duration);

/// Convert a configured number of seconds to a limit. `0` means no limit.
pub fn from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Run `fut`, failing with [`TimedOut`] if `limit` elapses first.
pub async fn within<F, T>(limit: Option<Duration>, fut: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TimedOut(limit)),
        None => Ok(fut.await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_disables_timeout() {
        assert_eq!(from_secs(0), None);
        assert_eq!(from_secs(5), Some(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn completes_without_limit() {
        assert_eq!(within(None, async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn elapses() {
        let limit = Duration::from_millis(50);
        let result = within(Some(limit), tokio::time::sleep(Duration::from_secs(10))).await;
        assert_eq!(result, Err(TimedOut(limit)));
    }
}
