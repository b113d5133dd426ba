use std::sync::Arc;

use admission::AdmissionController;
use cache::{CacheStore, MemoryCacheStore, RedisCacheStore, ResponseCache};
use config::Config;
use metrics_exporter_prometheus::PrometheusHandle;
use redis::Client as RedisClient;
use safety::SafetyFilter;
use thiserror::Error;
use tokio::task::JoinHandle;
use upstream::{RetryPolicy, UpstreamClient, UpstreamError};

pub mod admission;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod router;
pub mod routes;
pub mod safety;
pub mod upstream;
pub mod utils;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid redis url: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("failed to build upstream client: {0}")]
    Upstream(#[from] UpstreamError),
}

/// 应用上下文：启动时创建一次，传给所有处理函数
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub admission: Arc<AdmissionController>,
    pub safety: Arc<SafetyFilter>,
    pub cache: ResponseCache,
    pub upstream: UpstreamClient,
    pub metrics: PrometheusHandle,
}

impl AppState {
    /// 按配置选择缓存后端：配置了 Redis 地址用 Redis，否则用进程内缓存
    pub fn from_config(config: Config, metrics: PrometheusHandle) -> Result<Self, StartupError> {
        let store: Arc<dyn CacheStore> = if config.redis_url.trim().is_empty() {
            tracing::info!("No redis url configured, using in-process response cache");
            Arc::new(MemoryCacheStore::new(config.cache_max_entries))
        } else {
            let client = RedisClient::open(config.redis_url.clone())?;
            Arc::new(RedisCacheStore::new(Arc::new(client), config.cache_timeout()))
        };
        Self::with_store(config, store, metrics)
    }

    pub fn with_store(
        config: Config,
        store: Arc<dyn CacheStore>,
        metrics: PrometheusHandle,
    ) -> Result<Self, StartupError> {
        let upstream =
            UpstreamClient::new(RetryPolicy::from_config(&config), config.upstream_timeout())?;
        let cache = ResponseCache::new(store, config.cache_ttl(), config.cache_single_flight)
            .with_timeout(config.cache_timeout());

        Ok(Self {
            admission: Arc::new(AdmissionController::from_config(&config)),
            safety: Arc::new(SafetyFilter::new(
                config.max_tokens_cap,
                &config.denylist_words,
            )),
            cache,
            upstream,
            metrics,
            config: Arc::new(config),
        })
    }

    /// 启动后台任务（空闲令牌桶清理）
    pub fn start_background(&self) -> Vec<JoinHandle<()>> {
        let mut tasks = Vec::new();
        if let Some(every) = self.config.rate_limit_sweep() {
            tasks.push(
                self.admission
                    .clone()
                    .spawn_sweeper(every, self.config.rate_limit_idle()),
            );
        }
        tasks
    }
}
