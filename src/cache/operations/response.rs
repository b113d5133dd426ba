use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use super::single_flight::{FlightGuard, SingleFlight};
use super::store::CacheStore;

/// 已完成（非流式）响应的缓存
///
/// 存储不可用或超时时查询视为未命中、写入仅记录日志，不影响请求本身。
#[derive(Clone)]
pub struct ResponseCache {
    store: Option<Arc<dyn CacheStore>>,
    ttl: Duration,
    op_timeout: Duration,
    single_flight: Option<Arc<SingleFlight>>,
}

/// 单次缓存读写的默认超时
pub const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_millis(500);

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration, single_flight: bool) -> Self {
        Self {
            store: (!ttl.is_zero()).then_some(store),
            ttl,
            op_timeout: DEFAULT_CACHE_TIMEOUT,
            single_flight: single_flight.then(|| Arc::new(SingleFlight::new())),
        }
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn lookup(&self, key: &str) -> Option<Bytes> {
        let store = self.store.as_ref()?;
        match tokio::time::timeout(self.op_timeout, store.get(key)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => {
                tracing::warn!(key, error = %e, "Cache lookup failed, bypassing cache");
                None
            }
            Err(_) => {
                tracing::warn!(
                    key,
                    timeout_ms = self.op_timeout.as_millis() as u64,
                    "Cache lookup timed out, bypassing cache"
                );
                None
            }
        }
    }

    pub async fn store(&self, key: &str, value: Bytes) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        match tokio::time::timeout(self.op_timeout, store.set_ex(key, value, self.ttl)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(key, error = %e, "Cache store failed"),
            Err(_) => tracing::warn!(
                key,
                timeout_ms = self.op_timeout.as_millis() as u64,
                "Cache store timed out"
            ),
        }
    }

    /// 开启单飞时获取该键的独占权，关闭时返回 None
    pub async fn begin_flight(&self, key: &str) -> Option<FlightGuard> {
        match &self.single_flight {
            Some(flight) if self.is_enabled() => Some(flight.acquire(key).await),
            _ => None,
        }
    }
}
