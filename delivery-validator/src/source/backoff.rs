use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::SinkError;

/// Backoff between retries of a throttled request.
///
/// - initial_delay: delay before the first retry
/// - multiplier: growth per retry, 1.0 keeps the delay fixed
/// - max_delay: cap for the computed delay
#[derive(Debug, Clone, Copy)]
pub struct BackoffPolicy {
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub const fn new(initial_delay: Duration, multiplier: f64, max_delay: Duration) -> Self {
        Self {
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    pub const fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
        }
    }

    pub fn next_delay(&self, attempt: u32) -> Duration {
        let pow = self.multiplier.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        Duration::try_from_secs_f64(self.initial_delay.as_secs_f64() * pow)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// How the log stream reader paces itself against CloudWatch.
#[derive(Debug, Clone, Copy)]
pub struct ThrottlePolicy {
    /// Pause before every page request except the first
    pub page_delay: Duration,
    pub backoff: BackoffPolicy,
    /// 0 means unlimited retries
    pub max_retries: u32,
}

impl ThrottlePolicy {
    pub const fn new(page_delay: Duration, backoff: BackoffPolicy, max_retries: u32) -> Self {
        Self {
            page_delay,
            backoff,
            max_retries,
        }
    }

    /// No waiting at all, for tests and local replays
    pub const fn immediate(max_retries: u32) -> Self {
        Self::new(
            Duration::ZERO,
            BackoffPolicy::fixed(Duration::ZERO),
            max_retries,
        )
    }

    /// Re-issues `call` while it fails with `SinkError::Throttled`. Any other
    /// error is returned immediately.
    pub async fn retry_throttled<T, F, Fut>(&self, mut call: F) -> Result<T, SinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, SinkError>>,
    {
        let mut retries = 0u32;
        loop {
            match call().await {
                Err(SinkError::Throttled(msg)) => {
                    if self.max_retries != 0 && retries >= self.max_retries {
                        return Err(SinkError::RetriesExhausted {
                            attempts: retries,
                            last: msg,
                        });
                    }
                    let delay = self.backoff.next_delay(retries);
                    retries += 1;
                    warn!(
                        "Throttled ({msg}), retry {retries} in {}ms",
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(100),
            BackoffPolicy::fixed(Duration::from_secs(5)),
            60,
        )
    }
}
