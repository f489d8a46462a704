//! Generic poll-until-ready primitive with an explicit retry policy.
//!
//! Both long waits in a payment flow, attestation polling and relayer receipt
//! polling, are the same shape: ask an endpoint, get "not yet", back off, ask
//! again, give up after a budget. [`RetryPolicy`] captures the schedule as a
//! value and [`poll_until`] runs it, cancellable at any point between
//! attempts.

use std::fmt::Display;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Interval schedule for a polling loop.
///
/// The first [`initial_attempts`](RetryPolicy::initial_attempts) retries use
/// the short [`initial_interval`](RetryPolicy::initial_interval) (indexing
/// delays are unpredictable, so early retries are cheap and often win), then
/// the loop settles on [`steady_interval`](RetryPolicy::steady_interval)
/// until the total [`budget`](RetryPolicy::budget) is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_interval: Duration,
    pub initial_attempts: u32,
    pub steady_interval: Duration,
    /// Upper bound on the total wait, across all attempts.
    pub budget: Duration,
}

impl RetryPolicy {
    /// Attestation schedule for fast-finality burns: attestations usually land
    /// within seconds, so retry eagerly and give up after five minutes.
    pub const fn fast_attestation() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_secs(5),
            initial_attempts: 6,
            steady_interval: Duration::from_secs(10),
            budget: Duration::from_secs(5 * 60),
        }
    }

    /// Attestation schedule for standard-finality burns, which take minutes
    /// to tens of minutes.
    pub const fn standard_attestation() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_secs(5),
            initial_attempts: 6,
            steady_interval: Duration::from_secs(10),
            budget: Duration::from_secs(30 * 60),
        }
    }

    /// Receipt schedule for relayed user operations: fixed short interval,
    /// one-minute budget.
    pub const fn user_operation_receipt() -> Self {
        RetryPolicy {
            initial_interval: Duration::from_secs(2),
            initial_attempts: 0,
            steady_interval: Duration::from_secs(2),
            budget: Duration::from_secs(60),
        }
    }

    /// Sleep interval before the given (1-based) retry.
    pub fn interval_for(&self, attempt: u32) -> Duration {
        if attempt <= self.initial_attempts {
            self.initial_interval
        } else {
            self.steady_interval
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PollError {
    /// The budget ran out before the condition held. Carries the last
    /// transient error observed, if any.
    #[error("budget of {budget:?} exhausted after {attempts} attempts")]
    Timeout {
        attempts: u32,
        budget: Duration,
        last_error: Option<String>,
    },
    /// The caller cancelled the wait. Whatever was already submitted on-chain
    /// stays submitted; cancellation only stops the watching.
    #[error("polling cancelled by caller")]
    Cancelled,
}

/// Repeatedly run `op` until it yields a value, following `policy`.
///
/// `op` returns `Ok(None)` for "not ready yet". Transient errors are logged
/// and retried like a not-ready result; only the budget or cancellation end
/// the loop.
pub async fn poll_until<T, E, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut op: F,
) -> Result<T, PollError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
    E: Display,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut last_error = None;
    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled);
        }
        match op().await {
            Ok(Some(value)) => return Ok(value),
            Ok(None) => {}
            Err(err) => {
                tracing::debug!(error = %err, attempt = attempts, "poll attempt failed");
                last_error = Some(err.to_string());
            }
        }
        attempts += 1;
        let interval = policy.interval_for(attempts);
        if started.elapsed() + interval > policy.budget {
            return Err(PollError::Timeout {
                attempts,
                budget: policy.budget,
                last_error,
            });
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(PollError::Cancelled),
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn interval_schedule_is_short_then_steady() {
        let policy = RetryPolicy::fast_attestation();
        assert_eq!(policy.interval_for(1), Duration::from_secs(5));
        assert_eq!(policy.interval_for(6), Duration::from_secs(5));
        assert_eq!(policy.interval_for(7), Duration::from_secs(10));
        assert_eq!(policy.interval_for(100), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_once_the_condition_holds() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();
        let result = poll_until(&RetryPolicy::fast_attestation(), &cancel, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, Infallible>((n >= 3).then_some(n)) }
        })
        .await;
        assert_eq!(result, Ok(3));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_within_the_budget() {
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let result: Result<(), _> =
            poll_until(&RetryPolicy::fast_attestation(), &cancel, || async {
                Ok::<_, Infallible>(None)
            })
            .await;
        match result {
            Err(PollError::Timeout { attempts, .. }) => assert!(attempts > 0),
            other => panic!("expected timeout, got {other:?}"),
        }
        assert!(started.elapsed() <= RetryPolicy::fast_attestation().budget);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_errors_are_retried_and_reported_on_timeout() {
        let cancel = CancellationToken::new();
        let result: Result<(), _> = poll_until(
            &RetryPolicy::user_operation_receipt(),
            &cancel,
            || async { Err("connection reset") },
        )
        .await;
        match result {
            Err(PollError::Timeout { last_error, .. }) => {
                assert_eq!(last_error.as_deref(), Some("connection reset"));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_the_loop() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> =
            poll_until(&RetryPolicy::fast_attestation(), &cancel, || async {
                Ok::<_, Infallible>(None)
            })
            .await;
        assert_eq!(result, Err(PollError::Cancelled));
    }
}
