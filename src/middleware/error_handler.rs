use axum::{
    body::{Body, to_bytes},
    http::{Request, header},
    middleware::Next,
    response::Response,
};

use super::rate_limit::metrics_path;
use crate::logging::LogRecord;
use crate::utils::REQUEST_ID_HEADER;

/// 记录 5xx 响应体时的读取上限
const ERROR_BODY_LIMIT: usize = 64 * 1024;

/// 5xx 响应统一记录一条 server_error 日志，响应体原样返回
pub async fn log_errors(req: Request<Body>, next: Next) -> Response {
    let path = metrics_path(req.uri().path());
    let response = next.run(req).await;

    if !response.status().is_server_error() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let request_id = parts
        .headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let bytes = match to_bytes(body, ERROR_BODY_LIMIT).await {
        Ok(b) => b,
        Err(e) => {
            LogRecord::new("server_error")
                .request_id(request_id)
                .field("path", path)
                .field("status", parts.status.as_u16())
                .field("error", format!("unreadable body: {e}"))
                .error();
            return Response::from_parts(parts, Body::empty());
        }
    };

    LogRecord::new("server_error")
        .request_id(request_id)
        .field("path", path)
        .field("status", parts.status.as_u16())
        .field("body", String::from_utf8_lossy(&bytes).into_owned())
        .error();

    // 响应体已被读出，长度以重建后的为准
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(bytes))
}
