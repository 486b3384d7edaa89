//! # Exponential Backoff
//!
//! Bounded, cancellable retry policy used wherever the controller waits on the
//! backend: parent lookups that tolerate propagation delay, and optimistic
//! read-modify-write cycles that lost a version race.
//!
//! Sequence for `RetryPolicy::new(4, 3s, 12s)`: 3s, 6s, 12s, then the attempts
//! are exhausted. Sleeps end early when the [`Cancellation`] fires.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Retry parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial: Duration,
    /// Cap on any single delay
    pub max: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_attempts: u32, initial: Duration, max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial,
            max,
            multiplier: 2,
        }
    }

    /// Single attempt, no waiting
    #[must_use]
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Delay before attempt `attempt + 1`, where `attempt` counts from 1
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Backoff iterator over this policy's delays
    #[must_use]
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.clone())
    }
}

/// Stateful walk through a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    policy: RetryPolicy,
    attempt: u32,
}

impl ExponentialBackoff {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy, attempt: 1 }
    }

    /// Current attempt number, starting at 1
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay before the next attempt, or `None` once attempts are exhausted
    pub fn next_backoff(&mut self) -> Option<Duration> {
        if self.attempt >= self.policy.max_attempts {
            return None;
        }
        let delay = self.policy.delay_after(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// Sleep before the next attempt.
    ///
    /// Returns `Ok(false)` when attempts are exhausted and `Err(Cancelled)` if
    /// `cancel` fires first.
    pub async fn wait(&mut self, cancel: &Cancellation) -> Result<bool, Cancelled> {
        let Some(delay) = self.next_backoff() else {
            return Ok(false);
        };
        cancel.sleep(delay).await?;
        Ok(true)
    }

    /// Reset to the first attempt
    pub fn reset(&mut self) {
        self.attempt = 1;
    }
}

/// Returned when a wait was cut short by cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Cancellation signal shared by every in-flight operation
#[derive(Debug, Clone)]
pub struct Cancellation {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancellation {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Completes once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }

    /// Sleep for `delay` unless cancelled first
    pub async fn sleep(&self, delay: Duration) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled);
        }
        tokio::select! {
            () = tokio::time::sleep(delay) => Ok(()),
            () = self.cancelled() => Err(Cancelled),
        }
    }
}
