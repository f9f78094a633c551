//! Retry with backoff for generation sub-calls

use super::AcquireError;
use crate::cancel::CancellationToken;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Default backoff table: 1s, 2s, 4s, 8s.
pub const DEFAULT_BACKOFF_MS: [u64; 4] = [1000, 2000, 4000, 8000];

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 4;

/// Waits between attempts. Injectable so tests never sleep.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, delay: Duration);
}

/// Real waiting on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        if let Ok(mut delays) = self.delays.lock() {
            delays.push(delay);
        }
    }
}

/// How often and how patiently a failing sub-call is retried
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub retries: u32,
    /// Delay before retry `n` is `delays[min(n, len - 1)]`
    pub delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRIES, &DEFAULT_BACKOFF_MS)
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, backoff_ms: &[u64]) -> Self {
        Self {
            retries,
            delays: backoff_ms.iter().copied().map(Duration::from_millis).collect(),
        }
    }

    /// Delay before the retry following failed attempt `attempt` (0-based).
    /// The last entry of the table is reused once the table runs out.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.delays.len() {
            0 => Duration::ZERO,
            len => self.delays[(attempt as usize).min(len - 1)],
        }
    }

    /// Run `op` until it succeeds, fails permanently, or the budget is spent.
    ///
    /// Only errors whose [`AcquireError::is_retryable`] is true are retried;
    /// the last error is returned once the budget is exhausted. Cancellation
    /// is checked before every attempt.
    pub async fn run<T, F, Fut>(
        &self,
        label: &str,
        sleeper: &dyn Sleeper,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, AcquireError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AcquireError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            cancel.checkpoint()?;
            debug!(label, attempt, "Generation attempt");
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.retries => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        label,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Transient failure, retrying after backoff"
                    );
                    sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn upstream(status: Option<u16>) -> AcquireError {
        AcquireError::Upstream {
            status,
            message: "scripted".into(),
        }
    }

    #[test]
    fn last_delay_is_reused() {
        let policy = RetryPolicy::new(6, &[10, 20]);
        assert_eq!(policy.delay_for(0), Duration::from_millis(10));
        assert_eq!(policy.delay_for(1), Duration::from_millis(20));
        assert_eq!(policy.delay_for(5), Duration::from_millis(20));
        assert_eq!(RetryPolicy::new(1, &[]).delay_for(3), Duration::ZERO);
    }

    #[tokio::test]
    async fn retries_transient_failures_until_success() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result = policy
            .run("test", &sleeper, &CancellationToken::new(), move || async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(upstream(Some(503)))
                } else {
                    Ok(n)
                }
            })
            .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let policy = RetryPolicy::default();
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = policy
            .run("test", &sleeper, &CancellationToken::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(upstream(Some(400)))
            })
            .await;

        assert!(matches!(result, Err(AcquireError::Upstream { status: Some(400), .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[tokio::test]
    async fn exhausted_budget_surfaces_last_error() {
        let policy = RetryPolicy::new(2, &[5]);
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = policy
            .run("test", &sleeper, &CancellationToken::new(), move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(upstream(None))
            })
            .await;

        assert!(matches!(result, Err(AcquireError::Upstream { status: None, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.delays().len(), 2);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_first_attempt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = AtomicU32::new(0);
        let counter = &calls;

        let result: Result<(), _> = RetryPolicy::default()
            .run("test", &RecordingSleeper::new(), &cancel, move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AcquireError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
