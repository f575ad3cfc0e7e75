//! Bounded retry with exponential backoff for store operations.

use std::future::Future;
use std::time::Duration;

use crate::error::{Error, Result};

/// Retry policy for one logical store operation.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt; doubles per retry.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// A policy that never sleeps, for tests.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            attempts,
            base_delay: Duration::ZERO,
        }
    }
}

/// Run `f`, retrying transient failures up to the policy's bound.
///
/// Client errors (bad input) are returned immediately and never retried.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, op: &'static str, mut f: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = vigil_core::Result<T>>,
{
    let mut delay = policy.base_delay;
    let mut last = None;

    for attempt in 1..=policy.attempts.max(1) {
        match f().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_client_error() => return Err(Error::Core(err)),
            Err(err) => {
                tracing::warn!(op, attempt, error = %err, "store operation failed");
                last = Some(err);
                if attempt < policy.attempts {
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
            }
        }
    }

    Err(Error::RetriesExhausted {
        op,
        attempts: policy.attempts,
        last: last.map(|e| e.to_string()).unwrap_or_default(),
    })
}
