pub mod chat;
pub mod embed;
pub mod system;

use axum::{
    body::Bytes,
    extract::rejection::BytesRejection,
    http::StatusCode,
};
use serde::de::DeserializeOwned;

use crate::error::GatewayError;

/// 读取并解析 JSON 请求体，超出上限时返回 payload_too_large
pub(crate) fn parse_json_body<T: DeserializeOwned>(
    body: Result<Bytes, BytesRejection>,
    limit: usize,
) -> Result<T, GatewayError> {
    let bytes = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            GatewayError::PayloadTooLarge { limit }
        } else {
            GatewayError::InvalidRequest(rejection.body_text())
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}
