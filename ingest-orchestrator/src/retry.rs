//! Bounded retry with exponential backoff for store writes.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `op` up to `attempts` times, doubling the delay after each failure.
/// The last error is returned once attempts are exhausted.
pub(crate) async fn with_backoff<T, E, F, Fut>(
    label: &str,
    attempts: u32,
    base: Duration,
    mut op: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = attempts.max(1);
    let mut delay = base;
    let mut last_attempt = 1;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if last_attempt < attempts => {
                warn!(
                    "{label}: attempt {last_attempt}/{attempts} failed: {e}; retrying in {:?}",
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                last_attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result: Result<u32, String> =
            with_backoff("test", 3, Duration::from_millis(1), || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(String::from("transient"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_bound() {
        let calls = AtomicU32::new(0);
        let result: Result<(), String> =
            with_backoff("test", 3, Duration::from_millis(1), || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(String::from("persistent")) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
