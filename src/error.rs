use axum::Json;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::admission::AdmissionRejection;
use crate::safety::SafetyReason;
use crate::upstream::UpstreamError;
use crate::utils::REQUEST_ID_HEADER;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Too many requests, please retry later.")]
    RateLimited,

    #[error("Request body exceeds {limit} bytes.")]
    PayloadTooLarge { limit: usize },

    #[error("Invalid request body: {0}")]
    InvalidRequest(String),

    #[error("Request blocked by safety policy.")]
    SafetyBlocked(SafetyReason),

    #[error("Upstream error")]
    UpstreamUnavailable(#[source] UpstreamError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::SafetyBlocked(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// 机器可读的原因码
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::RateLimited => "rate_limited",
            GatewayError::PayloadTooLarge { .. } => "payload_too_large",
            GatewayError::InvalidRequest(_) => "invalid_request",
            GatewayError::SafetyBlocked(reason) => reason.as_str(),
            GatewayError::UpstreamUnavailable(_) => "upstream_unavailable",
        }
    }

    pub fn with_request_id(self, request_id: impl Into<String>) -> RejectedRequest {
        RejectedRequest {
            request_id: request_id.into(),
            error: self,
        }
    }

    pub fn from_admission(rejection: AdmissionRejection, limit: usize) -> Self {
        match rejection {
            AdmissionRejection::RateLimited => GatewayError::RateLimited,
            AdmissionRejection::PayloadTooLarge => GatewayError::PayloadTooLarge { limit },
        }
    }
}

/// 带关联 ID 的拒绝响应
#[derive(Debug)]
pub struct RejectedRequest {
    pub request_id: String,
    pub error: GatewayError,
}

#[derive(Debug, Serialize)]
struct ErrorResponse<'a> {
    code: u16,
    error: &'a str,
    error_message: String,
    request_id: &'a str,
}

impl IntoResponse for RejectedRequest {
    fn into_response(self) -> Response {
        let status = self.error.status();
        let body = Json(ErrorResponse {
            code: status.as_u16(),
            error: self.error.code(),
            error_message: self.error.to_string(),
            request_id: &self.request_id,
        });

        let mut response = (status, body).into_response();
        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[tokio::test]
    async fn rejection_body_is_structured() {
        let response = GatewayError::RateLimited
            .with_request_id("req-42")
            .into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], 429);
        assert_eq!(json["error"], "rate_limited");
        assert_eq!(json["request_id"], "req-42");
    }

    #[test]
    fn reason_codes() {
        assert_eq!(
            GatewayError::SafetyBlocked(SafetyReason::Denylist).code(),
            "denylist"
        );
        assert_eq!(
            GatewayError::from_admission(AdmissionRejection::PayloadTooLarge, 10).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        let upstream = GatewayError::UpstreamUnavailable(UpstreamError::Transport("x".into()));
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(upstream.code(), "upstream_unavailable");
    }
}
