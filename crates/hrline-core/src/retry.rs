//! Bounded retry with exponential backoff for transient page failures

use std::time::Duration;

use crate::error::PipelineError;

/// How many times a transient failure (429, 5xx, connection error) is retried
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Fail on the first error
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(2),
        }
    }

    pub const fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// base, 2×base, 4×base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

/// Run `attempt_fn`, retrying transient errors up to `policy.max_retries` times.
///
/// Returns the first success, or the last error once retries are exhausted
/// or the error is not transient.
pub fn retry_transient<T>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt_fn: impl FnMut() -> Result<T, PipelineError>,
) -> Result<T, PipelineError> {
    let mut attempt = 0u32;
    loop {
        match attempt_fn() {
            Ok(v) => return Ok(v),
            Err(e) if attempt < policy.max_retries && e.is_transient() => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                log::warn!(
                    "{label}: attempt {attempt}/{} failed: {}, retrying in {delay:?}",
                    policy.max_retries,
                    e.detail()
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}
