/// 缓存键模块

// 响应缓存键
pub mod response_keys;

pub use response_keys::{canonical_json, response_cache_key};
