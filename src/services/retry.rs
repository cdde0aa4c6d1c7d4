//! Bounded polling shared by the generation job poller and the Threads
//! container poller.
//!
//! A poll gives up after `max_attempts` polls spaced `interval` apart. When
//! `max_consecutive_errors` is zero every poll error is fatal; otherwise
//! errors are treated as transient, and a run of that many consecutive errors
//! triggers one `error_backoff` pause before polling resumes with the counter
//! reset. Every poll, failed or not, counts against the attempt budget.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Sleep one interval before the first poll as well.
    pub wait_before_first: bool,
    pub max_consecutive_errors: u32,
    pub error_backoff: Duration,
}

impl RetryPolicy {
    /// Generation jobs: 60 polls, 2 s apart, any error aborts.
    pub const fn generation() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_millis(2000),
            wait_before_first: false,
            max_consecutive_errors: 0,
            error_backoff: Duration::ZERO,
        }
    }

    /// Threads video containers: 60 polls, 1 s apart, 5 consecutive
    /// errors earn a 5 s pause.
    pub const fn container() -> Self {
        Self {
            max_attempts: 60,
            interval: Duration::from_millis(1000),
            wait_before_first: true,
            max_consecutive_errors: 5,
            error_backoff: Duration::from_millis(5000),
        }
    }

    pub fn tolerates_errors(&self) -> bool {
        self.max_consecutive_errors > 0
    }
}

/// Result of a single poll.
#[derive(Debug)]
pub enum PollStep<T> {
    Ready(T),
    Pending,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError<E> {
    #[error("gave up after {attempts} attempts")]
    Exhausted { attempts: u32 },

    #[error("{0}")]
    Failed(E),
}

/// Poll until `check` reports `Ready` or the policy's budget runs out.
///
/// `check` receives the 1-based attempt number.
pub async fn poll_until<T, E, F, Fut>(
    policy: &RetryPolicy,
    subject: &str,
    mut check: F,
) -> Result<T, PollError<E>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollStep<T>, E>>,
    E: Display,
{
    let mut consecutive_errors = 0u32;

    for attempt in 1..=policy.max_attempts {
        if attempt > 1 || policy.wait_before_first {
            sleep(policy.interval).await;
        }

        match check(attempt).await {
            Ok(PollStep::Ready(value)) => {
                debug!(subject, attempt, "Poll reached a terminal state");
                return Ok(value);
            }
            Ok(PollStep::Pending) => {
                consecutive_errors = 0;
                debug!(
                    subject,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "Still pending"
                );
            }
            Err(e) => {
                if !policy.tolerates_errors() {
                    return Err(PollError::Failed(e));
                }

                consecutive_errors += 1;
                warn!(
                    subject,
                    attempt,
                    consecutive_errors,
                    error = %e,
                    "Transient error while polling, retrying"
                );

                if consecutive_errors >= policy.max_consecutive_errors {
                    warn!(
                        subject,
                        backoff_ms = policy.error_backoff.as_millis() as u64,
                        "Too many consecutive polling errors, backing off"
                    );
                    sleep(policy.error_backoff).await;
                    consecutive_errors = 0;
                }
            }
        }
    }

    Err(PollError::Exhausted {
        attempts: policy.max_attempts,
    })
}
