use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{admission, log_errors, request_id},
    routes,
};

// 网关路由
pub fn gateway_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(routes::system::health))
        .route("/metrics", get(routes::system::metrics))
        .route("/chat", post(routes::chat::chat))
        .route("/embed", post(routes::embed::embed))
}

// 创建主路由：关联 ID → 错误日志 → 准入检查 → 处理函数
pub fn create_router(state: AppState) -> Router {
    let body_limit = state.admission.max_body_bytes();

    gateway_routes()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            admission,
        ))
        .layer(axum::middleware::from_fn(log_errors))
        .layer(axum::middleware::from_fn(request_id))
        .with_state(state)
}
