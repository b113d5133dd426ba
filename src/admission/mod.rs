//! 准入控制：按客户端限流的令牌桶，以及请求体大小上限。

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

use crate::config::Config;

/// 准入拒绝原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionRejection {
    RateLimited,
    PayloadTooLarge,
}

/// 单个客户端的令牌桶
#[derive(Debug, Clone)]
pub struct Bucket {
    pub tokens: f64,
    pub last_refill: Instant,
}

impl Bucket {
    fn full(burst: f64, now: Instant) -> Self {
        Self {
            tokens: burst,
            last_refill: now,
        }
    }

    fn refill(&mut self, now: Instant, rate: f64, burst: f64) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(burst);
        // 时钟不前进时保留原时间点，避免丢失小数部分
        if now > self.last_refill {
            self.last_refill = now;
        }
    }

    fn try_take(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

pub struct AdmissionController {
    rate: f64,
    burst: f64,
    max_body_bytes: usize,
    buckets: DashMap<String, Bucket>,
}

impl AdmissionController {
    pub fn new(rate: f64, burst: u32, max_body_bytes: usize) -> Self {
        Self {
            rate,
            burst: f64::from(burst),
            max_body_bytes,
            buckets: DashMap::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.rate_limit_rps,
            config.rate_limit_burst,
            config.request_size_limit_bytes,
        )
    }

    pub fn allow(&self, identity: &str) -> bool {
        self.allow_at(identity, Instant::now())
    }

    /// 按给定时间点补充并尝试消耗一个令牌
    pub fn allow_at(&self, identity: &str, now: Instant) -> bool {
        if let Some(mut bucket) = self.buckets.get_mut(identity) {
            bucket.refill(now, self.rate, self.burst);
            return bucket.try_take();
        }

        let mut bucket = self
            .buckets
            .entry(identity.to_string())
            .or_insert_with(|| Bucket::full(self.burst, now));
        bucket.refill(now, self.rate, self.burst);
        bucket.try_take()
    }

    /// 准入检查：先限流，再检查声明的请求体大小
    pub fn check(
        &self,
        identity: &str,
        content_length: Option<u64>,
    ) -> Result<(), AdmissionRejection> {
        if !self.allow(identity) {
            return Err(AdmissionRejection::RateLimited);
        }
        self.check_size(content_length)
    }

    /// 根据 Content-Length 检查请求体大小，缺失时放行（读取时再次限制）
    pub fn check_size(&self, content_length: Option<u64>) -> Result<(), AdmissionRejection> {
        match content_length {
            Some(len) if len > self.max_body_bytes as u64 => {
                Err(AdmissionRejection::PayloadTooLarge)
            }
            _ => Ok(()),
        }
    }

    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    pub fn tokens(&self, identity: &str) -> Option<f64> {
        self.buckets.get(identity).map(|bucket| bucket.tokens)
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// 空闲时间至少为补满整桶所需时间，清理后与保留的桶行为一致
    pub fn eviction_threshold(&self, idle: Duration) -> Duration {
        // 补满时间超出 Duration 范围时视为永不清理
        let refill = Duration::try_from_secs_f64(self.burst / self.rate).unwrap_or(Duration::MAX);
        idle.max(refill)
    }

    /// 清理空闲的令牌桶，返回清理数量
    pub fn evict_idle(&self, now: Instant, idle: Duration) -> usize {
        let threshold = self.eviction_threshold(idle);
        let before = self.buckets.len();
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < threshold);
        before.saturating_sub(self.buckets.len())
    }

    /// 启动后台清理任务
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, idle: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = self.evict_idle(Instant::now(), idle);
                if evicted > 0 {
                    tracing::debug!(
                        evicted,
                        remaining = self.bucket_count(),
                        "Evicted idle rate limit buckets"
                    );
                }
            }
        })
    }
}
