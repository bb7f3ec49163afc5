//! Bounded fixed-interval retry for network-facing operations.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::LabelerError;

/// Retry policy: a bounded number of attempts with a fixed pause between
/// them.
///
/// Deliberately linear rather than exponential: the labeler is a short-lived
/// init step with a bounded wall-clock budget, and each attempt is cheap.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            interval: Duration::from_secs(10),
        }
    }
}

/// Executes `operation` until it succeeds, fails terminally, or the attempt
/// budget runs out.
///
/// The error value classifies itself via [`LabelerError::is_retryable`]; the
/// governor is policy-agnostic and trusts that classification. On exhaustion
/// the most recent error is returned.
///
/// # Errors
/// Returns the first terminal error, or the last error once all attempts are
/// spent.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
) -> Result<T, LabelerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LabelerError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                if attempt >= config.max_attempts {
                    warn!(
                        error = %e,
                        attempts = attempt,
                        "{operation_name} exhausted its retry budget"
                    );
                    return Err(e);
                }
                warn!(
                    error = %e,
                    attempt,
                    max_attempts = config.max_attempts,
                    "{operation_name} failed, retrying in {:?}",
                    config.interval
                );
                tokio::time::sleep(config.interval).await;
            }
        }
    }
}
