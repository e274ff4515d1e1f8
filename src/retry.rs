//! # Startup Retry
//!
//! Fixed-delay retry around an initial load.
//!
//! Reconciliation passes never retry on their own. Callers that must not start
//! without configuration wrap the first `load()` in [`load_with_retry`].

use crate::constants::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_SECS};
use crate::error::ProviderError;
use crate::provider::KeyVaultConfigurationProvider;
use crate::reconciler::PassOutcome;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Attempt count and fixed delay between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }
}

/// Run `operation` until it succeeds, fails permanently or attempts run out
///
/// Only transient errors are retried. At least one attempt is always made.
///
/// # Errors
/// Returns the last error observed.
pub async fn retry_transient<T, F, Fut>(
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < attempts => {
                warn!(
                    attempt,
                    attempts,
                    delay_secs = policy.delay.as_secs_f64(),
                    error = %e,
                    "Key Vault load failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Initial `load()` retried per `policy`
///
/// # Errors
/// Returns the last load error once attempts are exhausted, or any non-transient error.
pub async fn load_with_retry(
    provider: &KeyVaultConfigurationProvider,
    policy: &RetryPolicy,
) -> Result<PassOutcome, ProviderError> {
    retry_transient(policy, || provider.load()).await
}
