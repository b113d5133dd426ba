use std::future::Future;
use std::time::Duration;

use super::error::UpstreamError;
use crate::config::Config;

/// 指数退避重试策略
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_min: Duration, backoff_max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_min,
            backoff_max,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.retry_attempts, config.retry_min(), config.retry_max())
    }

    /// 第 n 次（从 1 开始）失败后的等待时间：2^(n-1) 秒，限制在 [min, max]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = Duration::from_secs(1u64 << exponent);
        delay.max(self.backoff_min).min(self.backoff_max)
    }

    /// 依次执行尝试，直到成功或次数耗尽
    pub async fn run<T, F, Fut>(&self, mut attempt: F) -> Result<T, UpstreamError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut n = 1;
        loop {
            let error = match attempt(n).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            if n >= self.max_attempts {
                return Err(UpstreamError::Unavailable {
                    attempts: n,
                    last: Box::new(error),
                });
            }

            let delay = self.backoff(n);
            tracing::warn!(
                attempt = n,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Upstream attempt failed, retrying"
            );
            crate::metrics::record_upstream_retry();
            tokio::time::sleep(delay).await;
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(500),
            Duration::from_secs(3),
        )
    }

    #[test]
    fn backoff_grows_and_is_bounded() {
        let policy = policy(5);
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(3));
        assert_eq!(policy.backoff(40), Duration::from_secs(3));

        let fast = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(5));
        assert_eq!(fast.backoff(1), Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = policy(3)
            .run(|n| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 3 {
                        Err(UpstreamError::Transport("refused".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = policy(3)
            .run(|_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(UpstreamError::Transport("refused".into())) }
            })
            .await;
        let error = result.unwrap_err();
        assert!(matches!(error, UpstreamError::Unavailable { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), _> = policy(3)
            .run(|_| async { Err(UpstreamError::Transport("refused".into())) })
            .await;
        // 1s + 2s，最后一次失败后不再等待
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }
}
