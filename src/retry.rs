use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Runs `op` up to `1 + retries` times, sleeping with jittered exponential
/// backoff between attempts. Only errors accepted by `is_transient` are retried.
pub async fn with_backoff<T, E, F, Fut>(
    retries: u32,
    base: Duration,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && is_transient(&e) => {
                let delay_ms = jittered_backoff(base, attempt);
                debug!(
                    attempt = attempt + 1,
                    delay_ms, "retrying after transient error"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Equal jitter backoff: base/2 + rand(0, base/2), base doubling per attempt.
pub fn jittered_backoff(base: Duration, attempt: u32) -> u64 {
    let base_ms = (base.as_millis() as u64).saturating_mul(2u64.saturating_pow(attempt));
    let half = base_ms / 2;
    half + fastrand::u64(..half.max(1))
}
