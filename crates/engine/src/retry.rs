// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Retry orchestration (spec §4.5): bounded attempts with exponential
//! backoff, a filter deciding whether a given failure is worth retrying at
//! all, and a failure hook reacting to each retried attempt.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Bookkeeping visible to a retry filter or failure hook mid-loop.
#[derive(Debug, Clone)]
pub struct RetryState {
    /// 1-indexed: the attempt that just failed.
    pub attempt: u32,
    /// The delay that will be slept before the next attempt, if any.
    pub current_delay: Duration,
    /// Every failure message seen so far, oldest first.
    pub failures: Vec<String>,
}

/// Decides whether a given failure should be retried at all. Consulted
/// before the failure hook fires; returning `false` aborts the loop
/// immediately with the original error, without counting against
/// `max_attempts`. Takes the failure itself (not just its message) so a
/// filter can branch on the concrete error variant via `downcast_ref`.
pub type RetryFilter = Arc<dyn Fn(&RetryPolicy, &RetryState, &(dyn std::error::Error + 'static)) -> bool + Send + Sync>;

/// Bounded exponential backoff over a step (or any fallible async block).
#[derive(Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub backoff_multiplier: f64,
    filter: Option<RetryFilter>,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, backoff_multiplier: f64) -> Self {
        Self {
            max_attempts,
            initial_delay,
            backoff_multiplier,
            filter: None,
        }
    }

    /// Gate retries on the failure itself; a filter returning `false`
    /// rethrows the original error instead of continuing the loop.
    pub fn with_filter(mut self, filter: RetryFilter) -> Self {
        self.filter = Some(filter);
        self
    }
}

/// The two distinct ways a retry loop can end in failure: the filter
/// rejected a retryable attempt (propagate the original error as-is), or
/// every attempt up to `max_attempts` failed (propagate the full history).
#[derive(Debug, Error)]
pub enum RetryError<E: std::error::Error + 'static> {
    #[error("{0}")]
    Direct(E),
    #[error("exceeded retry attempts: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Exhausted(Vec<E>),
}

/// Run `attempt` until it succeeds or the loop gives up, with no reaction to
/// intermediate failures beyond the policy's own filter.
pub async fn retry<F, Fut, T, E>(policy: Option<&RetryPolicy>, attempt: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
{
    controlled_retry(policy, attempt, |_, _, _| {}).await
}

/// Run `attempt` until it succeeds or the loop gives up, invoking
/// `on_failure` for every retryable failure (after the filter has accepted
/// it, before the backoff sleep).
pub async fn controlled_retry<F, Fut, T, E, H>(
    policy: Option<&RetryPolicy>,
    mut attempt: F,
    on_failure: H,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::error::Error + 'static,
    H: Fn(&RetryPolicy, &RetryState, &E),
{
    // A null policy means "run the block exactly once" (spec §4.5): a
    // failure here is not a retry budget exhausting, it's the one and only
    // attempt's own error, so it propagates as-is rather than as
    // `Exhausted`.
    let Some(policy) = policy else {
        return attempt().await.map_err(RetryError::Direct);
    };

    let mut state = RetryState {
        attempt: 0,
        current_delay: policy.initial_delay,
        failures: Vec::new(),
    };
    let mut history: Vec<E> = Vec::new();

    loop {
        state.attempt += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                let should_retry = policy.filter.as_ref().map(|f| f(policy, &state, &err)).unwrap_or(true);
                if !should_retry {
                    return Err(RetryError::Direct(err));
                }

                on_failure(policy, &state, &err);
                state.failures.push(err.to_string());
                history.push(err);

                if state.attempt >= policy.max_attempts {
                    return Err(RetryError::Exhausted(history));
                }

                tokio::time::sleep(state.current_delay).await;
                state.current_delay = Duration::from_millis(
                    (state.current_delay.as_secs_f64() * policy.backoff_multiplier * 1000.0).round() as u64,
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;
