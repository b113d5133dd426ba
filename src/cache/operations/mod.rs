/// 缓存操作

// 响应缓存
pub mod response;

// 单飞去重
pub mod single_flight;

// 存储后端
pub mod store;

pub use response::ResponseCache;
pub use single_flight::{FlightGuard, SingleFlight};
pub use store::{CacheError, CacheStore, MemoryCacheStore, RedisCacheStore};
