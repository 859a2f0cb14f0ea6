//! Exponential-backoff retry helper.
//!
//! A generic utility; it is deliberately not wired into the sync drain,
//! which treats per-record failures as skip-and-continue instead.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Delay before retry number `attempt` (0-based): `base * 2^attempt`.
pub fn backoff_delay(attempt: u32, base: Duration) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt))
}

/// Run `op` up to `max_attempts` times, sleeping an exponentially growing
/// delay between attempts. Only errors for which `retryable` returns true
/// are retried; others propagate immediately.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    max_attempts: u32,
    base_delay: Duration,
    mut op: F,
    mut retryable: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: FnMut(&E) -> bool,
{
    let mut attempt = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt + 1 < max_attempts && retryable(&e) => {
                let delay = backoff_delay(attempt, base_delay);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "Retrying after transient failure");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
