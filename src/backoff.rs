//! Delay strategies and retry budgets.
//!
//! Two independent policies drive the execution layer: the poll interval used
//! while a query is still running, and the delay used after a transient
//! engine error. Both accept a constant or a caller-supplied function of the
//! attempt number.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between status polls (milliseconds).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;

/// Default delay after a transient engine error (milliseconds).
pub const DEFAULT_TRANSIENT_DELAY_MS: u64 = 2000;

/// Default ceiling for a growing poll interval (milliseconds).
pub const DEFAULT_MAX_POLL_DELAY_MS: u64 = 30_000;

/// Computes the wait before the next attempt.
///
/// `attempt` is 1 for the first retry.
pub trait DelayStrategy: Send + Sync + fmt::Debug {
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Always the same delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstantDelay(pub Duration);

impl DelayStrategy for ConstantDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

/// `base + step * (attempt - 1)`, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearDelay {
    pub base: Duration,
    pub step: Duration,
    pub max: Option<Duration>,
}

impl LinearDelay {
    pub fn new(base: Duration, step: Duration) -> Self {
        Self {
            base,
            step,
            max: None,
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }
}

impl DelayStrategy for LinearDelay {
    fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self
            .step
            .checked_mul(attempt.saturating_sub(1))
            .and_then(|growth| self.base.checked_add(growth))
            .unwrap_or(Duration::MAX);
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// `base * factor^(attempt - 1)`, optionally capped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialDelay {
    pub base: Duration,
    pub factor: f64,
    pub max: Option<Duration>,
}

impl ExponentialDelay {
    pub fn new(base: Duration, factor: f64) -> Self {
        Self {
            base,
            factor,
            max: None,
        }
    }

    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }
}

impl DelayStrategy for ExponentialDelay {
    fn next_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base.as_nanos() as f64 * self.factor.powi(exponent);
        // Overflow and NaN both saturate.
        let delay = if scaled.is_finite() && scaled >= 0.0 && scaled < u64::MAX as f64 {
            Duration::from_nanos(scaled.round() as u64)
        } else {
            Duration::MAX
        };
        match self.max {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// Delay computed by a caller-supplied function of the attempt number.
pub struct FnDelay<F>(pub F);

impl<F> fmt::Debug for FnDelay<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDelay(..)")
    }
}

impl<F> DelayStrategy for FnDelay<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn next_delay(&self, attempt: u32) -> Duration {
        (self.0)(attempt)
    }
}

/// A delay strategy plus an optional attempt budget.
///
/// The default budget is unbounded: transient errors and running queries are
/// waited on forever unless `max_attempts` is set.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    strategy: Arc<dyn DelayStrategy>,
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Creates an unbounded policy from any strategy.
    pub fn new(strategy: impl DelayStrategy + 'static) -> Self {
        Self {
            strategy: Arc::new(strategy),
            max_attempts: None,
        }
    }

    /// Creates an unbounded constant-delay policy.
    pub fn constant(delay: Duration) -> Self {
        Self::new(ConstantDelay(delay))
    }

    /// Creates a policy from a closure of the attempt number.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(u32) -> Duration + Send + Sync + 'static,
    {
        Self::new(FnDelay(f))
    }

    /// Default poll interval policy (constant 200ms).
    pub fn default_poll() -> Self {
        Self::constant(Duration::from_millis(DEFAULT_POLL_INTERVAL_MS))
    }

    /// Default transient-error policy (constant 2000ms).
    pub fn default_transient() -> Self {
        Self::constant(Duration::from_millis(DEFAULT_TRANSIENT_DELAY_MS))
    }

    /// Limits the number of retries.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.strategy.next_delay(attempt)
    }
}

/// Attempt counter for one submission or one polling loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    current_delay: Duration,
}

impl RetryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of retries taken so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Delay handed out by the last `advance`.
    pub fn current_delay(&self) -> Duration {
        self.current_delay
    }

    /// Records one more retry and returns how long to wait before it.
    ///
    /// Returns `None` once the policy's budget is spent.
    pub fn advance(&mut self, policy: &RetryPolicy) -> Option<Duration> {
        if let Some(max) = policy.max_attempts() {
            if self.attempt >= max {
                return None;
            }
        }
        self.attempt += 1;
        self.current_delay = policy.delay_for(self.attempt);
        Some(self.current_delay)
    }

    /// Returns to the base state after a successful call.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
