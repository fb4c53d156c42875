//! Batch writes with exponential backoff
//!
//! A flush sends the same batch again and again until the store accepts it or
//! the attempt bound is reached. Between attempts the executor waits for
//! `min * factor^(attempt - 1)`, capped at `max`, optionally jittered down to
//! anywhere between `min` and that value.

use crate::error::{ImportError, Result};
use crate::store::StoreClient;
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use tsload_core::Point;

/// Exponential backoff parameters
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failure
    pub min: Duration,
    /// Upper bound for any delay
    pub max: Duration,
    /// Growth per failed attempt
    pub factor: f64,
    /// Randomize each delay between `min` and the computed value
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(100),
            max: Duration::from_secs(10),
            factor: 2.0,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retrying after `attempt` failures (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let min = self.min.as_nanos() as f64;
        let max = (self.max.as_nanos() as f64).max(min);
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let nanos = (min * self.factor.powi(exponent)).min(max);
        let delay = Duration::from_nanos(if nanos.is_finite() { nanos } else { max } as u64);

        if self.jitter && delay > self.min {
            let low = self.min.as_nanos() as u64;
            let high = delay.as_nanos() as u64;
            Duration::from_nanos(rand::thread_rng().gen_range(low..=high))
        } else {
            delay
        }
    }
}

/// Source of delays, replaceable in tests
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Attempt bookkeeping for one flush
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
}

impl RetryState {
    /// Record a failed attempt and return the new count
    pub fn record_failure(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a bounded executor must give up; `max_attempts == 0` never does
    pub fn exhausted(&self, max_attempts: u32) -> bool {
        max_attempts > 0 && self.attempts >= max_attempts
    }
}

/// Outcome of a successful flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushOutcome {
    /// Points the store accepted
    pub points: usize,
    /// Write calls made, including the successful one
    pub attempts: u32,
}

/// Delivers batches with retries
pub struct WriteRetryExecutor<S = TokioSleeper> {
    policy: BackoffPolicy,
    max_attempts: u32,
    sleeper: S,
    cancel: CancellationToken,
}

impl WriteRetryExecutor<TokioSleeper> {
    /// Executor sleeping on the tokio timer
    pub fn new(policy: BackoffPolicy, max_attempts: u32) -> Self {
        Self::with_sleeper(policy, max_attempts, TokioSleeper)
    }
}

impl<S: Sleeper> WriteRetryExecutor<S> {
    pub fn with_sleeper(policy: BackoffPolicy, max_attempts: u32, sleeper: S) -> Self {
        Self {
            policy,
            max_attempts,
            sleeper,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort retries when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Write `batch` until it succeeds.
    ///
    /// An empty batch is a no-op. The batch is resent unchanged on every attempt.
    /// Errors that cannot go away by resending are returned at once.
    pub async fn flush<C>(&self, client: &C, batch: &[Point]) -> Result<FlushOutcome>
    where
        C: StoreClient + ?Sized,
    {
        if batch.is_empty() {
            return Ok(FlushOutcome {
                points: 0,
                attempts: 0,
            });
        }

        let mut state = RetryState::default();
        loop {
            if self.cancel.is_cancelled() {
                return Err(ImportError::Cancelled);
            }

            match client.write(batch).await {
                Ok(result) => {
                    debug!(
                        "Wrote {} points ({} bytes) in {} attempt(s)",
                        result.points_written,
                        result.bytes_sent,
                        state.attempts() + 1
                    );
                    return Ok(FlushOutcome {
                        points: batch.len(),
                        attempts: state.attempts() + 1,
                    });
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    let attempts = state.record_failure();
                    if state.exhausted(self.max_attempts) {
                        return Err(ImportError::WriteExhausted {
                            attempts,
                            source: Box::new(e),
                        });
                    }

                    let delay = self.policy.delay(attempts);
                    warn!("Write failed: {} (retrying in {:?})", e, delay);
                    tokio::select! {
                        _ = self.sleeper.sleep(delay) => {}
                        _ = self.cancel.cancelled() => return Err(ImportError::Cancelled),
                    }
                }
            }
        }
    }
}
