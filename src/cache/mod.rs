// 缓存模块
// 包含缓存键与响应缓存操作

pub mod keys;
pub mod operations;

// 重新导出常用类型和函数，方便其他模块使用
pub use keys::response_cache_key;
pub use operations::{CacheError, CacheStore, MemoryCacheStore, RedisCacheStore, ResponseCache};
