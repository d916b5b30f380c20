//! Bounded status polling.
//!
//! Every wait in the deployment flow goes through [`wait_for_status`]: fetch
//! the current status, return as soon as it matches, otherwise sleep a fixed
//! interval and fetch again. A zero budget means "poll forever".
//!
//! The elapsed check runs only between polls, so a bounded wait can overshoot
//! its budget by up to one poll interval plus one fetch latency. Callers
//! accept that slack; do not tighten it without revisiting the timing
//! contract of every call site.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::status::StackStatus;

/// Delay between consecutive status fetches.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Outcome of one wait. The uniform vocabulary every wait call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A requested status was reached; carries the matched status.
    Success(StackStatus),
    /// The budget ran out; carries the last status seen, if any.
    Timeout(Option<StackStatus>),
    /// The stack disappeared or never existed.
    StackNotFound,
    /// The cancellation token fired mid-wait.
    Cancelled,
    /// The operation preceding the wait failed outright.
    Error(String),
}

/// Poll `get_status` until it returns a status in `statuses_to_match`.
///
/// A fetch that fails is interpreted as [`WaitOutcome::StackNotFound`] and
/// ends the wait immediately — a describe failure on a nonexistent resource
/// is expected, not transient, and is not retried. A fetch that returns no
/// status at all ends the wait the same way.
///
/// `budget == Duration::ZERO` waits forever (until match, not-found, or
/// cancellation). Any other budget produces [`WaitOutcome::Timeout`] carrying
/// the last-seen status once the elapsed wall-clock time exceeds it.
pub async fn wait_for_status<F, Fut, E>(
    mut get_status: F,
    statuses_to_match: &[&str],
    budget: Duration,
    cancel: &CancellationToken,
) -> WaitOutcome
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<StackStatus>, E>>,
    E: fmt::Display,
{
    let start = Instant::now();
    loop {
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            res = get_status() => res,
        };
        let status = match fetched {
            Ok(Some(status)) => status,
            Ok(None) => return WaitOutcome::StackNotFound,
            Err(e) => {
                tracing::debug!(error = %e, "status fetch failed, treating stack as gone");
                return WaitOutcome::StackNotFound;
            }
        };

        if statuses_to_match.iter().any(|s| *s == status.as_str()) {
            return WaitOutcome::Success(status);
        }
        tracing::debug!(status = %status, "status not matched yet");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            _ = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        if !budget.is_zero() && start.elapsed() > budget {
            return WaitOutcome::Timeout(Some(status));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn ok(status: &str) -> Result<Option<StackStatus>, String> {
        Ok(Some(StackStatus::from(status)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_matching_status_on_first_call_returns_success() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let outcome = wait_for_status(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { ok("CREATE_COMPLETE") }
            },
            &["CREATE_COMPLETE"],
            Duration::from_secs(90),
            &cancel,
        )
        .await;

        assert_eq!(
            outcome,
            WaitOutcome::Success(StackStatus::from("CREATE_COMPLETE"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_returns_not_found_without_retry() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let outcome = wait_for_status(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<Option<StackStatus>, _>("stack does not exist".to_string()) }
            },
            &["CREATE_COMPLETE"],
            Duration::from_secs(90),
            &cancel,
        )
        .await;

        assert_eq!(outcome, WaitOutcome::StackNotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_status_returns_not_found() {
        let cancel = CancellationToken::new();
        let outcome = wait_for_status(
            || async { Ok::<_, String>(None) },
            &["CREATE_COMPLETE"],
            Duration::ZERO,
            &cancel,
        )
        .await;
        assert_eq!(outcome, WaitOutcome::StackNotFound);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_second_budget_times_out_after_budget() {
        let cancel = CancellationToken::new();
        let start = tokio::time::Instant::now();

        let outcome = wait_for_status(
            || async { ok("SOME_CURRENT_STATUS") },
            &["CREATE_COMPLETE"],
            Duration::from_secs(1),
            &cancel,
        )
        .await;

        let elapsed = start.elapsed();
        assert_eq!(
            outcome,
            WaitOutcome::Timeout(Some(StackStatus::from("SOME_CURRENT_STATUS")))
        );
        assert!(elapsed >= Duration::from_secs(1), "elapsed {elapsed:?}");
        assert!(
            elapsed <= Duration::from_secs(1) + POLL_INTERVAL,
            "elapsed {elapsed:?}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_second_budget_polls_exactly_twice() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let outcome = wait_for_status(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { ok("SOME_CURRENT_STATUS") }
            },
            &["CREATE_COMPLETE"],
            Duration::from_secs(5),
            &cancel,
        )
        .await;

        assert!(matches!(outcome, WaitOutcome::Timeout(Some(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_budget_never_times_out() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let pending = wait_for_status(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { ok("SOME_CURRENT_STATUS") }
            },
            &["CREATE_COMPLETE"],
            Duration::ZERO,
            &cancel,
        );

        // Still polling after well over the default budgets elsewhere.
        let bounded = tokio::time::timeout(Duration::from_secs(120), pending).await;
        assert!(bounded.is_err(), "unbounded wait returned: {bounded:?}");
        assert!(calls.load(Ordering::SeqCst) >= 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_ends_wait_promptly() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let (outcome, ()) = tokio::join!(
            wait_for_status(
                || async { ok("SOME_CURRENT_STATUS") },
                &["CREATE_COMPLETE"],
                Duration::ZERO,
                &cancel,
            ),
            async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                trigger.cancel();
            }
        );

        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_eventual_match_returns_that_status() {
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let outcome = wait_for_status(
            || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        ok("UPDATE_IN_PROGRESS")
                    } else {
                        ok("UPDATE_COMPLETE")
                    }
                }
            },
            &["UPDATE_COMPLETE", "UPDATE_ROLLBACK_COMPLETE"],
            Duration::ZERO,
            &cancel,
        )
        .await;

        assert_eq!(
            outcome,
            WaitOutcome::Success(StackStatus::from("UPDATE_COMPLETE"))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
