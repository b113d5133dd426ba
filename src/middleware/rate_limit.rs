use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{ContentLength, HeaderMapExt};

use super::request_id::RequestId;
use crate::AppState;
use crate::error::GatewayError;
use crate::logging::LogRecord;
use crate::metrics;
use crate::utils::client_key;

/// 限流键，存放在请求扩展中
#[derive(Debug, Clone)]
pub struct ClientKey(pub String);

/// 准入检查：先限流，再按 Content-Length 检查请求体大小
pub async fn admission(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let path = metrics_path(req.uri().path());
    let request_id = req
        .extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let key = client_key(req.headers(), peer, state.config.trust_proxy_headers);

    let content_length = req.headers().typed_get::<ContentLength>().map(|len| len.0);
    if let Err(rejection) = state.admission.check(&key, content_length) {
        let error = GatewayError::from_admission(rejection, state.admission.max_body_bytes());
        return reject(error, path, &key, request_id);
    }

    req.extensions_mut().insert(ClientKey(key));
    next.run(req).await
}

fn reject(error: GatewayError, path: &'static str, key: &str, request_id: String) -> Response {
    metrics::record_request(path, error.status().as_u16());
    LogRecord::new(error.code())
        .request_id(request_id.clone())
        .field("client", key)
        .field("path", path)
        .info();
    error.with_request_id(request_id).into_response()
}

/// 指标标签只使用已知路径，防止标签基数失控
pub fn metrics_path(path: &str) -> &'static str {
    match path {
        "/chat" => "/chat",
        "/embed" => "/embed",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "other",
    }
}
