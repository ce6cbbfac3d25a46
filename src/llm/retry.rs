//! Retry with exponential backoff and jitter for transient LLM Gateway
//! failures (spec §4.3): `LLMUnavailable` and `LLMRateLimited` are retried
//! up to `llm.retry.maxAttempts` times; `LLMTimeout` and
//! `InvalidStructuredResponse` are not (a timeout or a malformed response
//! is unlikely to self-heal on an identical retry).

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

fn is_retryable(err: &Error) -> bool {
    matches!(err, Error::LLMUnavailable(_) | Error::LLMRateLimited(_) | Error::TransientIO(_))
}

/// Adds up to 25% jitter on top of `delay_ms`, derived from the current
/// instant rather than a `rand` dependency this crate has no other use
/// for — good enough to avoid synchronized retry storms across agents
/// without pulling in a new crate for one number.
fn jittered(delay_ms: u64) -> u64 {
    let spread = (delay_ms / 4).max(1);
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0) as u64;
    delay_ms + nanos % spread
}

/// Runs `op` up to `config.max_attempts` times, doubling the backoff delay
/// (capped at `config.max_backoff_ms`) between retryable failures.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut delay_ms = config.initial_backoff_ms;
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < config.max_attempts && is_retryable(&err) => {
                let sleep_ms = jittered(delay_ms);
                warn!(attempt, sleep_ms, error = %err, "retrying after transient llm failure");
                tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
                delay_ms = (delay_ms * 2).min(config.max_backoff_ms);
            }
            Err(err) => return Err(err),
        }
    }
}
