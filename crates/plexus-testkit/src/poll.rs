//! Polling for eventually-consistent conditions
//!
//! A check is evaluated, and while it fails with a retryable error the
//! caller sleeps for the retry interval and evaluates it again. Sleeping goes
//! through the tokio timer, so other tasks (including the stacks being
//! observed) keep running between attempts. When the timeout elapses the
//! last failure is returned unchanged.

use crate::error::TestkitResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

/// Retry interval and overall deadline of a polling loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause between two attempts
    pub retry_wait: Duration,
    /// Overall time allowed; too large to be a deadline means no deadline
    pub timeout: Duration,
}

impl PollPolicy {
    /// Policy from its parts
    pub fn new(retry_wait: Duration, timeout: Duration) -> Self {
        Self {
            retry_wait,
            timeout,
        }
    }
}

/// Evaluate `check` until it succeeds, fails permanently or times out
///
/// The check always runs at least once, and once more at the deadline, so
/// a condition that becomes true just before the timeout is still observed.
pub async fn eventually<T, F, Fut>(policy: PollPolicy, mut check: F) -> TestkitResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TestkitResult<T>>,
{
    let started = Instant::now();
    let deadline = started.checked_add(policy.timeout);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        let err = match check().await {
            Ok(value) => {
                debug!(attempts, elapsed_ms = started.elapsed().as_millis() as u64, "condition met");
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => err,
        };

        let now = Instant::now();
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(now),
            None => Duration::MAX,
        };
        if remaining.is_zero() {
            warn!(
                attempts,
                timeout_ms = policy.timeout.as_millis() as u64,
                error = %err,
                "condition not met before timeout"
            );
            return Err(err);
        }
        debug!(attempts, error = %err, "condition not met, retrying");
        sleep(policy.retry_wait.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TestkitError;
    use std::cell::Cell;

    fn flaky(stack: &str) -> TestkitError {
        TestkitError::NotConnectedToAny {
            stack: stack.to_string(),
            missing: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_once_condition_holds() {
        let start = Instant::now();
        let ready_at = start + Duration::from_secs(1);
        let policy = PollPolicy::new(Duration::from_millis(500), Duration::from_secs(2));

        let value = eventually(policy, || async {
            if Instant::now() >= ready_at {
                Ok(7)
            } else {
                Err(flaky("Alpha"))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 7);
        assert!(start.elapsed() >= Duration::from_secs(1));
        assert!(start.elapsed() < Duration::from_millis(1_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_with_last_error() {
        let start = Instant::now();
        let attempt = Cell::new(0);
        let policy = PollPolicy::new(Duration::from_millis(500), Duration::from_secs(2));

        let err = eventually(policy, || {
            attempt.set(attempt.get() + 1);
            let n = attempt.get();
            async move { Err::<(), _>(flaky(&format!("attempt-{n}"))) }
        })
        .await
        .unwrap_err();

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert_eq!(attempt.get(), 5);
        assert_eq!(err, flaky("attempt-5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_is_not_retried() {
        let attempt = Cell::new(0);
        let policy = PollPolicy::new(Duration::from_millis(500), Duration::from_secs(10));

        let err = eventually(policy, || {
            attempt.set(attempt.get() + 1);
            async {
                Err::<(), _>(TestkitError::UnknownRemote {
                    stack: "Alpha".into(),
                    remote: "Omega".into(),
                })
            }
        })
        .await
        .unwrap_err();

        assert_eq!(attempt.get(), 1);
        assert!(matches!(err, TestkitError::UnknownRemote { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_timeout_checks_once() {
        let attempt = Cell::new(0);
        let policy = PollPolicy::new(Duration::from_millis(500), Duration::ZERO);

        let result = eventually(policy, || {
            attempt.set(attempt.get() + 1);
            async { Err::<(), _>(flaky("Alpha")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempt.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_timeout_keeps_polling() {
        let start = Instant::now();
        let ready_at = start + Duration::from_secs(30);
        let policy = PollPolicy::new(Duration::from_millis(500), Duration::MAX);

        let value = eventually(policy, || async {
            if Instant::now() >= ready_at {
                Ok("ready")
            } else {
                Err(flaky("Alpha"))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, "ready");
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
