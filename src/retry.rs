//! Retrying of transient service errors.

use crate::{Error, Result};

use rand::Rng;
use std::{fmt, time};

/// Service error codes worth retrying.
const RETRYABLE_CODES: &[&str] = &[
    "ProvisionedThroughputExceededException",
    "ThrottlingException",
    "RequestLimitExceeded",
    "InternalServerError",
    "ServiceUnavailable",
    "TransactionConflictException",
    "TransactionInProgressException",
];

/// HTTP statuses worth retrying whatever the error code says.
const RETRYABLE_STATUSES: &[u16] = &[500, 503];

/// Transaction cancellation reasons worth retrying.
const RETRYABLE_CANCELLATIONS: &[&str] = &[
    "TransactionConflict",
    "ThrottlingError",
    "ProvisionedThroughputExceeded",
];

pub(crate) fn is_retryable_code(code: &str) -> bool {
    RETRYABLE_CODES.contains(&code)
}

pub(crate) fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

pub(crate) fn is_retryable_cancellation(code: &str) -> bool {
    RETRYABLE_CANCELLATIONS.contains(&code)
}

/// Decides whether, and after how long, a failed request is sent again.
pub trait RetryPolicy: fmt::Debug + Send + Sync {
    /// The delay before retry number `attempt` (starting at 0) of a request
    /// that failed with `err`, or `None` to give up.
    fn retry_after(&self, attempt: u32, err: &Error) -> Option<time::Duration>;
}

/// Never retries.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn retry_after(&self, _attempt: u32, _err: &Error) -> Option<time::Duration> {
        None
    }
}

/// Exponential backoff with full jitter, for retryable errors only.
#[derive(Clone, Debug)]
pub struct Backoff {
    /// Upper bound of the first delay.
    pub initial: time::Duration,
    /// Upper bound of any delay.
    pub max: time::Duration,
    /// Retries before giving up.
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: time::Duration::from_millis(50),
            max: time::Duration::from_secs(20),
            max_attempts: 10,
        }
    }
}

impl Backoff {
    /// The largest delay allowed before retry number `attempt`.
    pub fn ceiling(&self, attempt: u32) -> time::Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial.saturating_mul(factor).min(self.max)
    }
}

impl RetryPolicy for Backoff {
    fn retry_after(&self, attempt: u32, err: &Error) -> Option<time::Duration> {
        if attempt >= self.max_attempts || !err.is_retryable() {
            return None;
        }
        let ceiling = self.ceiling(attempt).as_millis();
        let ceiling = u64::try_from(ceiling).unwrap_or(u64::MAX);
        let delay = rand::rng().random_range(0..=ceiling);
        Some(time::Duration::from_millis(delay))
    }
}

/// Runs `operation` until it succeeds or `policy` gives up.
pub(crate) async fn run<T, F, Fut>(policy: &dyn RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        let err = match operation().await {
            Ok(output) => return Ok(output),
            Err(err) => err,
        };
        let Some(delay) = policy.retry_after(attempt, &err) else {
            return Err(err);
        };
        #[cfg(feature = "tracing")]
        tracing::debug!(
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            error = %err,
            "retrying request"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    }
}

/// Waits before resending the `count` requests a batch left unprocessed,
/// or fails with [`Error::Unprocessed`] when `policy` gives up.
pub(crate) async fn wait_unprocessed(
    policy: &dyn RetryPolicy,
    attempt: u32,
    count: usize,
) -> Result<()> {
    let err = Error::Unprocessed { count };
    let Some(delay) = policy.retry_after(attempt, &err) else {
        return Err(err);
    };
    #[cfg(feature = "tracing")]
    tracing::debug!(
        attempt,
        count,
        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
        "resending unprocessed batch requests"
    );
    tokio::time::sleep(delay).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use rstest::rstest;
    use std::sync::atomic;

    fn service_error(code: &str, retryable: bool) -> Error {
        Error::Service {
            code: Some(code.to_string()),
            status: None,
            message: code.to_string(),
            retryable,
            source: code.into(),
        }
    }

    #[derive(Debug)]
    struct Immediate(u32);

    impl RetryPolicy for Immediate {
        fn retry_after(&self, attempt: u32, err: &Error) -> Option<time::Duration> {
            (attempt < self.0 && err.is_retryable()).then_some(time::Duration::ZERO)
        }
    }

    #[rstest]
    #[case::throughput("ProvisionedThroughputExceededException", true)]
    #[case::throttling("ThrottlingException", true)]
    #[case::internal("InternalServerError", true)]
    #[case::unavailable("ServiceUnavailable", true)]
    #[case::conflict("TransactionConflictException", true)]
    #[case::validation("ValidationException", false)]
    #[case::condition("ConditionalCheckFailedException", false)]
    fn test_is_retryable_code(#[case] code: &str, #[case] expected: bool) {
        assert_eq!(is_retryable_code(code), expected);
    }

    #[rstest]
    #[case::first(0, 50)]
    #[case::second(1, 100)]
    #[case::fifth(4, 800)]
    #[case::capped(12, 20_000)]
    #[case::overflow(40, 20_000)]
    fn test_backoff_ceiling(#[case] attempt: u32, #[case] expected_ms: u64) {
        let backoff = Backoff::default();
        assert_eq!(backoff.ceiling(attempt), time::Duration::from_millis(expected_ms));
    }

    #[test]
    fn test_backoff_gives_up() {
        let backoff = Backoff::default();
        let retryable = service_error("ThrottlingException", true);
        let delay = backoff.retry_after(3, &retryable).unwrap();
        assert!(delay <= backoff.ceiling(3));
        assert!(backoff.retry_after(10, &retryable).is_none());
        assert!(backoff.retry_after(0, &Error::NotFound).is_none());
        assert!(NoRetry.retry_after(0, &retryable).is_none());
    }

    #[tokio::test]
    async fn test_run_retries_until_success() {
        let calls = &atomic::AtomicU32::new(0);
        let output = run(&Immediate(5), move || async move {
            match calls.fetch_add(1, atomic::Ordering::SeqCst) {
                0 | 1 => Err(service_error("ThrottlingException", true)),
                _ => Ok("done"),
            }
        })
        .await
        .unwrap();
        assert_eq!(output, "done");
        assert_eq!(calls.load(atomic::Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_run_stops_on_fatal_error() {
        let calls = &atomic::AtomicU32::new(0);
        let err = run(&Immediate(5), move || async move {
            calls.fetch_add(1, atomic::Ordering::SeqCst);
            Err::<(), _>(service_error("ValidationException", false))
        })
        .await
        .unwrap_err();
        assert_eq!(err.code(), Some("ValidationException"));
        assert_eq!(calls.load(atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_unprocessed() {
        assert!(wait_unprocessed(&Immediate(1), 0, 3).await.is_ok());
        let err = wait_unprocessed(&Immediate(1), 1, 3).await.unwrap_err();
        assert!(matches!(err, Error::Unprocessed { count: 3 }));
        assert!(wait_unprocessed(&NoRetry, 0, 3).await.is_err());
    }

    #[tokio::test]
    async fn test_run_gives_up_after_attempts() {
        let calls = &atomic::AtomicU32::new(0);
        let err = run(&Immediate(2), move || async move {
            calls.fetch_add(1, atomic::Ordering::SeqCst);
            Err::<(), _>(service_error("ThrottlingException", true))
        })
        .await
        .unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(calls.load(atomic::Ordering::SeqCst), 3);
    }
}
