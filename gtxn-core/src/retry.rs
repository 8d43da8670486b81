//! The retry/backoff policy (spec §4.2), extracted as its own component so
//! the writer state machines can be tested against a stub `KvStore` that
//! scripts a sequence of responses, independent of backoff timing (spec §9,
//! "extract the policy as a separate component").

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::clock::Clock;
use crate::error::Error;

/// `maxRetries` default for the embedded path (spec §4.2).
pub const DEFAULT_MAX_RETRIES_EMBEDDED: u32 = 3;
/// `maxRetries` default per document for the index path (spec §4.2).
pub const DEFAULT_MAX_RETRIES_INDEXED: u32 = 5;
/// `operationDeadlineMs` default (spec §4.2): 2.5x the 20ms p95 target.
pub const DEFAULT_OPERATION_DEADLINE_MS: u64 = 50;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub operation_deadline_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: DEFAULT_MAX_RETRIES_EMBEDDED,
            operation_deadline_ms: DEFAULT_OPERATION_DEADLINE_MS,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, operation_deadline_ms: u64) -> Self {
        RetryPolicy {
            max_retries,
            operation_deadline_ms,
        }
    }

    /// Linear backoff capped at 10ms (spec §4.2): `min(retryIndex * 2, 10)`.
    pub fn backoff_duration(retry_index: u32) -> Duration {
        Duration::from_millis((retry_index as u64 * 2).min(10))
    }

    fn deadline_from(&self, start: Instant) -> Instant {
        start + Duration::from_millis(self.operation_deadline_ms)
    }
}

/// Outcome of a retried attempt (spec §4.2).
#[derive(Debug, Clone)]
pub struct AttemptOutcome<T> {
    pub value: Option<T>,
    pub retries_used: u32,
    pub conflicts_observed: u32,
    pub timed_out: bool,
    pub elapsed_ms: u64,
    /// Set when every retry raised a non-retryable error; carries the last
    /// such error for the caller to inspect.
    pub failed: Option<Error>,
}

impl<T> AttemptOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.value.is_some()
    }
}

/// Runs `op` under the retry/backoff policy. `op` is handed the current
/// retry index (0 on the first attempt) and must return a fresh attempt
/// each call -- it is expected to close over a `KvStore` and re-`get` on
/// retry, not to replay a cached response.
///
/// Termination order matches spec §4.2: deadline-exceeded takes precedence
/// over retry-exhaustion when both apply at the same attempt boundary.
pub async fn attempt<F, Fut, T>(
    policy: &RetryPolicy,
    clock: Arc<dyn Clock>,
    mut op: F,
) -> AttemptOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, Error>>,
{
    let start = clock.now_instant();
    let deadline = policy.deadline_from(start);

    let mut retries_used = 0u32;
    let mut conflicts_observed = 0u32;

    loop {
        if clock.now_instant() >= deadline {
            return AttemptOutcome {
                value: None,
                retries_used,
                conflicts_observed,
                timed_out: true,
                elapsed_ms: elapsed_ms(start, clock.now_instant()),
                failed: Some(Error::Deadline),
            };
        }

        match op(retries_used).await {
            Ok(value) => {
                return AttemptOutcome {
                    value: Some(value),
                    retries_used,
                    conflicts_observed,
                    timed_out: false,
                    elapsed_ms: elapsed_ms(start, clock.now_instant()),
                    failed: None,
                };
            }
            Err(err) if err.is_retryable() => {
                if matches!(err, Error::Conflict(_)) {
                    conflicts_observed += 1;
                }
                if retries_used >= policy.max_retries {
                    return AttemptOutcome {
                        value: None,
                        retries_used,
                        conflicts_observed,
                        timed_out: false,
                        elapsed_ms: elapsed_ms(start, clock.now_instant()),
                        failed: Some(err),
                    };
                }
                retries_used += 1;

                let backoff = RetryPolicy::backoff_duration(retries_used);
                let now = clock.now_instant();
                let remaining = deadline.saturating_duration_since(now);
                if remaining.is_zero() {
                    return AttemptOutcome {
                        value: None,
                        retries_used,
                        conflicts_observed,
                        timed_out: true,
                        elapsed_ms: elapsed_ms(start, clock.now_instant()),
                        failed: Some(Error::Deadline),
                    };
                }
                tokio::time::sleep(backoff.min(remaining)).await;
            }
            Err(err) => {
                return AttemptOutcome {
                    value: None,
                    retries_used,
                    conflicts_observed,
                    timed_out: false,
                    elapsed_ms: elapsed_ms(start, clock.now_instant()),
                    failed: Some(err),
                };
            }
        }
    }
}

fn elapsed_ms(start: Instant, now: Instant) -> u64 {
    now.saturating_duration_since(start).as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let policy = RetryPolicy::default();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let outcome = attempt(&policy, clock, |_| async { Ok::<_, Error>(42) }).await;
        assert!(outcome.is_success());
        assert_eq!(outcome.retries_used, 0);
    }

    #[tokio::test]
    async fn retries_conflicts_up_to_budget() {
        let policy = RetryPolicy::new(3, 1000);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let outcome = attempt(&policy, clock, move |_| {
            let calls = calls2.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(Error::Conflict("mismatch".into()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert!(outcome.is_success());
        assert_eq!(outcome.retries_used, 2);
        assert_eq!(outcome.conflicts_observed, 2);
    }

    #[tokio::test]
    async fn exhausts_retry_budget() {
        let policy = RetryPolicy::new(2, 1000);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let outcome = attempt(&policy, clock, |_| async {
            Err::<(), _>(Error::Conflict("always".into()))
        })
        .await;
        assert!(!outcome.is_success());
        assert_eq!(outcome.retries_used, 2);
        assert!(!outcome.timed_out);
    }

    #[tokio::test]
    async fn zero_deadline_times_out_immediately() {
        let policy = RetryPolicy::new(5, 0);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let outcome = attempt(&policy, clock, |_| async { Ok::<_, Error>(1) }).await;
        assert!(outcome.timed_out);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn non_retryable_error_surfaces_immediately() {
        let policy = RetryPolicy::default();
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let outcome = attempt(&policy, clock, |_| async {
            Err::<(), _>(Error::DuplicateTxn("t1".into()))
        })
        .await;
        assert_eq!(outcome.retries_used, 0);
        assert!(matches!(outcome.failed, Some(Error::DuplicateTxn(_))));
    }
}
