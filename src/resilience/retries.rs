//! Retry logic.
//!
//! # Responsibilities
//! - Decide whether a failed call is worth repeating
//! - Repeat it with exponential backoff + jitter up to a fixed attempt count
//!
//! # Design Decisions
//! - Errors classify themselves through [`Retryable`]
//! - Connection errors always retryable; 4xx never

use std::future::Future;

use crate::resilience::backoff::Backoff;

/// Errors that know whether a repeat could succeed.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `op` until it succeeds, fails permanently, or `max_attempts` is spent.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, backoff: Backoff, mut op: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                attempt += 1;
                let delay = backoff.delay(attempt);
                tracing::debug!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "Retrying call");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
