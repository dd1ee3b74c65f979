//! Bounded retry policy for the embedding collaborator.
//!
//! [`RetryPolicy::run`] calls an operation up to `max_attempts` times,
//! sleeping between failed attempts, and reports a tagged [`RetryOutcome`]
//! instead of raising. The caller decides what exhaustion means; retrieval
//! maps it to [`crate::RetrievalError::EmbeddingGenerationExhausted`].

use crate::config;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::Duration;
use tracing::warn;

/// How the delay between attempts evolves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Same delay before every retry.
    #[default]
    Fixed,
    /// Delay doubles after each failed attempt, capped at `max_delay_ms`.
    Exponential,
}

/// Retry budget for one call to a fallible collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Delay after the first failed attempt, in milliseconds.
    pub delay_ms: u64,
    pub backoff: Backoff,
    /// Upper bound for a single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: config::DEFAULT_EMBED_MAX_ATTEMPTS,
            delay_ms: config::DEFAULT_EMBED_RETRY_DELAY_MS,
            backoff: Backoff::Fixed,
            max_delay_ms: config::MAX_EMBED_RETRY_DELAY_MS,
        }
    }
}

/// Result of running an operation under a [`RetryPolicy`].
#[derive(Debug)]
pub enum RetryOutcome<T, E> {
    /// The operation succeeded on attempt `attempts`.
    Success { value: T, attempts: u32 },
    /// Every attempt failed; `last_error` is the final failure.
    Exhausted { attempts: u32, last_error: E },
}

impl<T, E> RetryOutcome<T, E> {
    /// Attempts made, successful or not.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }

    /// Convert into a `Result`, mapping exhaustion with `on_exhausted`.
    pub fn into_result<X>(self, on_exhausted: impl FnOnce(u32, E) -> X) -> Result<T, X> {
        match self {
            RetryOutcome::Success { value, .. } => Ok(value),
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => Err(on_exhausted(attempts, last_error)),
        }
    }
}

impl RetryPolicy {
    /// Fixed delay between attempts.
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
            backoff: Backoff::Fixed,
            ..Self::default()
        }
    }

    /// Doubling delay between attempts, starting at `initial` and capped at `max`.
    pub fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: initial.as_millis() as u64,
            backoff: Backoff::Exponential,
            max_delay_ms: max.as_millis() as u64,
        }
    }

    /// Retry without sleeping between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::fixed(max_attempts, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let ms = match self.backoff {
            Backoff::Fixed => self.delay_ms,
            Backoff::Exponential => {
                let shift = attempt.saturating_sub(1).min(32);
                self.delay_ms.saturating_mul(1u64 << shift)
            }
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }

    /// Delay before retrying failed attempt `attempt` when the failure
    /// carried a server-suggested wait. The longer of the two wins, capped at
    /// `max_delay_ms`.
    pub fn delay_before_retry(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let delay = self.delay_for(attempt);
        match hint {
            Some(hint) => delay.max(hint).min(Duration::from_millis(self.max_delay_ms)),
            None => delay,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. There is no sleep after the
    /// final failed attempt.
    pub fn run<T, E, F>(&self, op: F) -> RetryOutcome<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_with_hint(op, |_| None)
    }

    /// Like [`RetryPolicy::run`], but `hint` may extract a suggested wait
    /// (e.g. Retry-After) from each failure. See [`RetryPolicy::delay_before_retry`].
    pub fn run_with_hint<T, E, F, H>(&self, mut op: F, hint: H) -> RetryOutcome<T, E>
    where
        E: Display,
        F: FnMut(u32) -> Result<T, E>,
        H: Fn(&E) -> Option<Duration>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt) {
                Ok(value) => {
                    return RetryOutcome::Success {
                        value,
                        attempts: attempt,
                    }
                }
                Err(e) if attempt >= max_attempts => {
                    warn!(attempt, max_attempts, error = %e, "Giving up after final attempt");
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    };
                }
                Err(e) => {
                    let delay = self.delay_before_retry(attempt, hint(&e));
                    warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
