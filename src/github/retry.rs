//! Exponential backoff retry for GitHub API calls.
//!
//! Only transient errors are retried. Not-found and permanent errors are
//! returned on the first attempt.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use super::error::GitHubApiError;
use crate::backoff::Backoff;

/// How many times to retry, and how long to wait between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl RetryConfig {
    /// 3 retries with 1s, 2s, 4s delays.
    ///
    /// Kept short: every call also runs under the caller's 30s deadline, and
    /// the merge controller has its own backoff on top.
    pub const DEFAULT: Self = Self {
        max_retries: 3,
        backoff: Backoff::new(Duration::from_secs(1), Duration::from_secs(8), 2.0),
    };

    /// Single attempt, no retries.
    pub const NONE: Self = Self {
        max_retries: 0,
        backoff: Backoff::NONE,
    };

    pub fn new(
        max_retries: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_retries,
            backoff: Backoff::new(initial_delay, max_delay, backoff_multiplier),
        }
    }

    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.backoff.delay_for_attempt(attempt)
    }

    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_retries).map(|attempt| self.delay_for_attempt(attempt))
    }

    pub fn total_max_wait(&self) -> Duration {
        self.delays().sum()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Runs `operation`, retrying transient failures per `config`.
///
/// Returns the first success, the first non-transient error, or the last
/// transient error once retries are exhausted.
pub async fn retry_with_backoff<T, F, Fut>(
    config: RetryConfig,
    op: &'static str,
    mut operation: F,
) -> Result<T, GitHubApiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, GitHubApiError>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.kind.is_retriable() && attempt < config.max_retries => {
                let delay = config.delay_for_attempt(attempt);
                debug!(op, attempt, delay = ?delay, error = %e, "Retrying GitHub call");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
