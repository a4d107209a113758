use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

/// Retry policy for idempotent requests. Transient failures back off
/// exponentially with jitter; non-transient failures return immediately.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_attempts: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub async fn execute<F, Fut, T, E>(
        &self,
        label: &str,
        is_transient: fn(&E) -> bool,
        operation: F,
    ) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 0;
        let mut delay = self.initial_delay;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!("{} succeeded after {} attempts", label, attempt);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    if attempt >= self.max_attempts || !is_transient(&error) {
                        return Err(error);
                    }

                    warn!(
                        "{} attempt {} failed: {}, retrying in {:?}",
                        label, attempt, error, delay
                    );

                    let actual_delay = if self.jitter {
                        let jitter_ms =
                            (delay.as_millis() as f64 * rand::random::<f64>() * 0.1) as u64;
                        delay + Duration::from_millis(jitter_ms)
                    } else {
                        delay
                    };

                    tokio::time::sleep(actual_delay).await;

                    delay = Duration::from_millis(
                        (delay.as_millis() as f64 * self.backoff_multiplier) as u64,
                    )
                    .min(self.max_delay);
                }
            }
        }
    }
}
