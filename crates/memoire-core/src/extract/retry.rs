//! Retry wrapper for any [`Extractor`] — linear backoff on generic
//! transport errors, a longer fixed delay on rate limiting. Grounded in
//! `openai_extractor.py`'s `MAX_RETRIES`/`RETRY_DELAY` constants and its
//! rate-limit-vs-generic-error branching.

use std::time::Duration;

use async_trait::async_trait;

use super::{ExtractError, ExtractResult, Extractor};

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(25),
            rate_limit_delay: Duration::from_secs(25),
        }
    }
}

/// Wraps an [`Extractor`] with [`RetryPolicy`], retrying `extract_batch` on
/// transport/rate-limit errors before giving up.
pub struct RetryingExtractor<E: Extractor> {
    inner: E,
    policy: RetryPolicy,
}

impl<E: Extractor> RetryingExtractor<E> {
    pub fn new(inner: E, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<E: Extractor> Extractor for RetryingExtractor<E> {
    async fn extract_batch(&self, texts: &[String], last_gr_id: Option<i64>) -> ExtractResult {
        let mut attempt = 0;
        loop {
            match self.inner.extract_batch(texts, last_gr_id).await {
                Ok(records) => return Ok(records),
                Err(err) if attempt + 1 >= self.policy.max_retries => return Err(err),
                Err(ExtractError::RateLimited) => {
                    tracing::warn!(attempt, "rate limited, backing off");
                    tokio::time::sleep(self.policy.rate_limit_delay * (attempt + 1)).await;
                }
                Err(ExtractError::Transport(msg)) => {
                    tracing::warn!(attempt, error = %msg, "transport error, retrying");
                    tokio::time::sleep(self.policy.base_delay).await;
                }
                Err(err) => return Err(err),
            }
            attempt += 1;
        }
    }
}
