use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use moka::Expiry;
use moka::future::Cache;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, AsyncConnectionConfig, Client as RedisClient};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

/// 带过期时间的键值存储
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError>;

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError>;
}

/// Redis 缓存存储
///
/// 连接建立一次后复用，出错时丢弃，下次调用重新连接。
/// 建连与每条命令都有超时，Redis 无响应时按错误返回。
pub struct RedisCacheStore {
    redis: Arc<RedisClient>,
    config: AsyncConnectionConfig,
    conn: Mutex<Option<MultiplexedConnection>>,
}

impl RedisCacheStore {
    pub fn new(redis: Arc<RedisClient>, timeout: Duration) -> Self {
        Self {
            redis,
            config: AsyncConnectionConfig::new()
                .set_connection_timeout(timeout)
                .set_response_timeout(timeout),
            conn: Mutex::new(None),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, CacheError> {
        let mut slot = self.conn.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let conn = self
            .redis
            .get_multiplexed_async_connection_with_config(&self.config)
            .await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset(&self) {
        self.conn.lock().await.take();
    }

    async fn checked<T>(&self, result: redis::RedisResult<T>) -> Result<T, CacheError> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() {
                    self.reset().await;
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Option<Vec<u8>>> = conn.get(key).await;
        Ok(self.checked(result).await?.map(Bytes::from))
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection().await?;
        // SETEX 不接受 0 秒
        let secs = ttl.as_secs().max(1);
        let result: redis::RedisResult<()> = conn.set_ex(key, value.as_ref(), secs).await;
        self.checked(result).await
    }
}

/// 默认的进程内缓存容量
pub const DEFAULT_MEMORY_CAPACITY: u64 = 10_000;

/// 每个条目按写入时给定的 TTL 过期
struct EntryTtl;

impl Expiry<String, (Bytes, Duration)> for EntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &(Bytes, Duration),
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.1)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &(Bytes, Duration),
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.1)
    }
}

/// 进程内缓存存储，未配置 Redis 时使用
#[derive(Clone)]
pub struct MemoryCacheStore {
    entries: Cache<String, (Bytes, Duration)>,
}

impl MemoryCacheStore {
    pub fn new(max_entries: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(max_entries)
                .expire_after(EntryTtl)
                .build(),
        }
    }

    /// 处理完挂起的淘汰后的条目数
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        Ok(self.entries.get(key).await.map(|(value, _)| value))
    }

    async fn set_ex(&self, key: &str, value: Bytes, ttl: Duration) -> Result<(), CacheError> {
        self.entries.insert(key.to_string(), (value, ttl)).await;
        Ok(())
    }
}
