//! Engine configuration: store timeouts, retry policy and payment currency.

use std::time::Duration;

use rand::Rng;

/// Default bound on every store and gateway call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of compare-and-set attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default currency for charges.
pub const DEFAULT_CURRENCY: &str = "inr";

/// Exponential backoff with jitter between compare-and-set attempts.
///
/// `delay = min(initial_delay * 2^attempt, max_delay) * (0.5 + random(0.5))`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the total number of attempts (including the first). At least one.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the cap on any single delay.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay to wait after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        let capped = self.initial_delay.saturating_mul(factor).min(self.max_delay);
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        capped.mul_f64(jitter)
    }
}

/// Settings shared by every component of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub store_timeout: Duration,
    pub retry: RetryPolicy,
    pub currency: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
            retry: RetryPolicy::default(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.retry = self.retry.with_max_attempts(attempts);
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}
