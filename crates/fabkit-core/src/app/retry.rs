//! RetryHandle - resubmission layered over single-attempt client calls.
//!
//! The task configures a handle from its retry budget and passes a pre-retry
//! hook; the handle owns the loop and asks `RetryPolicy` after every failure.

use std::future::Future;

use tracing::debug;

use crate::domain::{Decision, InvocationError, RetryPolicy};

#[derive(Debug, Clone, Copy)]
pub struct RetryHandle {
    policy: RetryPolicy,
}

impl RetryHandle {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds or the policy gives up.
    ///
    /// `before_retry(next_attempt, &error)` runs after the resubmit delay and
    /// right before each resubmission; `next_attempt` is 1-based.
    pub async fn run<T, Op, Fut, Hook>(
        &self,
        mut op: Op,
        mut before_retry: Hook,
    ) -> Result<T, InvocationError>
    where
        Op: FnMut() -> Fut,
        Fut: Future<Output = Result<T, InvocationError>>,
        Hook: FnMut(u32, &InvocationError),
    {
        let mut attempt = 1;
        loop {
            let error = match op().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            match self.policy.decide(attempt, &error) {
                Decision::Retry { delay, reason } => {
                    debug!(attempt, %error, %reason, "resubmitting");
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                    before_retry(attempt, &error);
                }
                Decision::GiveUp { reason } => {
                    debug!(attempt, %error, %reason, "giving up");
                    return Err(error);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::{Duration, Instant};

    fn handle(max_attempts: u32, delay_ms: u64) -> RetryHandle {
        RetryHandle::new(RetryPolicy::new(max_attempts, Duration::from_millis(delay_ms)))
    }

    #[tokio::test]
    async fn succeeds_without_calling_the_hook() {
        let hooks = Cell::new(0);
        let out = handle(3, 0)
            .run(|| async { Ok::<_, InvocationError>(7) }, |_, _| hooks.set(hooks.get() + 1))
            .await
            .unwrap();
        assert_eq!(out, 7);
        assert_eq!(hooks.get(), 0);
    }

    #[tokio::test]
    async fn transient_errors_are_resubmitted_until_success() {
        let calls = Cell::new(0u32);
        let seen = std::cell::RefCell::new(Vec::new());
        let out = handle(5, 1)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    let n = calls.get();
                    async move {
                        if n < 3 {
                            Err(InvocationError::transient(format!("conflict {n}")))
                        } else {
                            Ok(n)
                        }
                    }
                },
                |next, err| seen.borrow_mut().push((next, err.to_string())),
            )
            .await
            .unwrap();
        assert_eq!(out, 3);
        assert_eq!(
            *seen.borrow(),
            vec![
                (2, "transient error: conflict 1".to_string()),
                (3, "transient error: conflict 2".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn persistent_error_is_returned_after_one_call() {
        let calls = Cell::new(0);
        let err = handle(5, 0)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>(InvocationError::persistent("policy failure")) }
                },
                |_, _| {},
            )
            .await
            .unwrap_err();
        assert_eq!(calls.get(), 1);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn budget_limits_the_number_of_calls() {
        let calls = Cell::new(0);
        let _ = handle(3, 0)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>(InvocationError::timeout_on_commit("no block")) }
                },
                |_, _| {},
            )
            .await;
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn waits_the_resubmit_delay_between_attempts() {
        let calls = Cell::new(0);
        let started = Instant::now();
        let _ = handle(3, 20)
            .run(
                || {
                    calls.set(calls.get() + 1);
                    async { Err::<(), _>(InvocationError::transient("x")) }
                },
                |_, _| {},
            )
            .await;
        assert_eq!(calls.get(), 3);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
