//! Retry with exponential backoff and bounded jitter.

use std::future::Future;
use std::time::Duration;

use rand::rngs::{OsRng, StdRng};
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Retry behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retries (0 = no retries).
    pub max_retries: u32,
    /// Initial backoff duration.
    pub initial_backoff: Duration,
    /// Maximum backoff duration.
    pub max_backoff: Duration,
    /// Backoff multiplier (e.g. 2.0 for doubling).
    pub multiplier: f64,
    /// Jitter factor in `[0.0, 1.0]`; backoff varies by ±factor.
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

impl RetryConfig {
    /// A config that disables retries.
    pub fn no_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 0,
            ..RetryConfig::default()
        }
    }
}

/// Per-call retry state.
struct Retryer {
    config: RetryConfig,
    attempt: u32,
    rng: StdRng,
}

impl Retryer {
    fn new(config: RetryConfig) -> Retryer {
        // Seed the jitter RNG from the OS CSPRNG so coordinated clients
        // cannot predict each other's backoff. Time-based seeding is the
        // fallback only if the secure source fails.
        let rng = match StdRng::from_rng(OsRng) {
            Ok(rng) => rng,
            Err(_) => {
                let nanos = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .map(|d| d.subsec_nanos() as u64 ^ d.as_secs())
                    .unwrap_or(0);
                StdRng::seed_from_u64(nanos)
            }
        };
        Retryer {
            config,
            attempt: 0,
            rng,
        }
    }

    fn should_retry(&self, err: &Error) -> bool {
        self.attempt < self.config.max_retries && err.retryable()
    }

    /// Backoff for the given 1-indexed attempt, before jitter:
    /// `min(initial * multiplier^(attempt-1), max_backoff)`.
    fn base_backoff(&self, attempt: u32) -> f64 {
        let mut backoff = self.config.initial_backoff.as_secs_f64();
        for _ in 1..attempt {
            backoff *= self.config.multiplier;
        }
        backoff.min(self.config.max_backoff.as_secs_f64())
    }

    fn next_backoff(&mut self) -> Duration {
        self.attempt += 1;
        let mut backoff = self.base_backoff(self.attempt);

        if self.config.jitter_factor > 0.0 {
            let jitter = (self.rng.gen::<f64>() * 2.0 - 1.0) * self.config.jitter_factor * backoff;
            backoff += jitter;
        }

        Duration::from_secs_f64(backoff.max(0.0))
    }

    /// Sleep for the next backoff. Cancellation happens by dropping the
    /// future; the sleep is the only suspension point.
    async fn wait(&mut self) {
        tokio::time::sleep(self.next_backoff()).await;
    }
}

/// Run an operation, retrying transient failures with exponential backoff.
pub async fn retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut retryer = Retryer::new(config.clone());
    loop {
        match op().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !retryer.should_retry(&err) {
                    return Err(err);
                }
                log::debug!(
                    "retrying after error (attempt {}): {err}",
                    retryer.attempt + 1
                );
                retryer.wait().await;
            }
        }
    }
}
