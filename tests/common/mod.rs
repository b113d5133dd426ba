#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response},
};
use inference_gateway::{
    AppState,
    cache::{CacheStore, MemoryCacheStore},
    config::{Config, LogFormat},
    metrics,
    router::create_router,
};
use serde_json::Value;
use tower::ServiceExt;

/// 指向 mock 后端、重试等待极短的测试配置
pub fn test_config(backend_url: &str) -> Config {
    Config {
        backend_url: backend_url.trim_end_matches('/').to_string(),
        model_id: "test-model".to_string(),
        redis_url: String::new(),
        rate_limit_rps: 1000.0,
        rate_limit_burst: 1000,
        rate_limit_sweep_secs: 0,
        max_tokens_cap: 512,
        denylist_words: vec!["banword".to_string(), "hack".to_string()],
        retry_attempts: 3,
        retry_min_secs: 0.001,
        retry_max_secs: 0.005,
        upstream_timeout_secs: 5,
        log_format: LogFormat::Text,
        ..Config::default()
    }
}

pub fn build_app(config: Config) -> (Router, Arc<MemoryCacheStore>) {
    let store = Arc::new(MemoryCacheStore::default());
    let app = build_app_with_store(config, store.clone());
    (app, store)
}

pub fn build_app_with_store(config: Config, store: Arc<dyn CacheStore>) -> Router {
    let state = AppState::with_store(config, store, metrics::detached_handle())
        .expect("state should build");
    create_router(state)
}

/// 按配置（含 Redis 地址）构建完整应用
pub fn build_app_from_config(config: Config) -> Router {
    let state =
        AppState::from_config(config, metrics::detached_handle()).expect("state should build");
    create_router(state)
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn completion_body() -> Value {
    serde_json::json!({
        "id": "cmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": "hello"}}],
        "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
    })
}
