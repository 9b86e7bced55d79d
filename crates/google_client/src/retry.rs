//! Fixed-schedule retry around a `Fetcher`.

use async_trait::async_trait;
use common::config::LocationConfig;
use common::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::Fetcher;

/// Delays between attempts. `backoffs.len() + 1` attempts in total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    backoffs: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(backoffs: Vec<Duration>) -> Self {
        Self { backoffs }
    }

    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn max_attempts(&self) -> u32 {
        self.backoffs.len() as u32 + 1
    }

    pub fn backoffs(&self) -> &[Duration] {
        &self.backoffs
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(4),
        ])
    }
}

/// Retries retryable failures on a fixed schedule; terminal failures
/// return immediately without consuming the remaining budget.
#[derive(Debug, Clone)]
pub struct RetryingFetcher<F> {
    inner: F,
    policy: RetryPolicy,
}

impl<F: Fetcher> RetryingFetcher<F> {
    pub fn new(inner: F, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

#[async_trait]
impl<F: Fetcher> Fetcher for RetryingFetcher<F> {
    type Raw = F::Raw;

    async fn fetch(&self, location: &LocationConfig) -> Result<F::Raw, Error> {
        let mut attempt: usize = 0;
        loop {
            match self.inner.fetch(location).await {
                Ok(raw) => {
                    if attempt > 0 {
                        info!(location = %location.id, attempt = attempt + 1, "fetch succeeded after retry");
                    }
                    return Ok(raw);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => match self.policy.backoffs.get(attempt) {
                    Some(delay) => {
                        warn!(
                            location = %location.id,
                            attempt = attempt + 1,
                            max_attempts = self.policy.max_attempts(),
                            backoff_ms = delay.as_millis() as u64,
                            error = %e,
                            "fetch failed, retrying"
                        );
                        sleep(*delay).await;
                        attempt += 1;
                    }
                    None => {
                        return Err(Error::RetriesExhausted {
                            attempts: attempt as u32 + 1,
                            source: Box::new(e),
                        });
                    }
                },
            }
        }
    }
}
