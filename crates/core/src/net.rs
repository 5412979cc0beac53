use crate::error::CapabilityError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Bounded exponential backoff for network-bound capability calls.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub(crate) async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if attempt >= policy.max_retries {
                    return Err(error);
                }
                let delay = policy.base_delay * 2u32.saturating_pow(attempt);
                warn!(
                    attempt = attempt + 1,
                    error = %error,
                    "capability request failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
