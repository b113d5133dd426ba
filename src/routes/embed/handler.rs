use std::time::Instant;

use axum::{
    Json,
    body::Bytes,
    extract::{Extension, State, rejection::BytesRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::AppState;
use crate::error::RejectedRequest;
use crate::logging::LogRecord;
use crate::metrics;
use crate::middleware::RequestId;
use crate::models::EmbeddingRequest;
use crate::routes::parse_json_body;
use crate::upstream::EmbeddingOutcome;

pub const EMBED_PATH: &str = "/embed";

/// 后端不支持向量接口时返回 501 与降级响应，而不是错误
pub async fn embed(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, RejectedRequest> {
    let started = Instant::now();

    let payload = match parse_json_body::<EmbeddingRequest>(body, state.admission.max_body_bytes()) {
        Ok(payload) => payload.with_default_model(&state.config.model_id),
        Err(e) => {
            metrics::record_request(EMBED_PATH, e.status().as_u16());
            return Err(e.with_request_id(request_id));
        }
    };
    let model = payload.model.clone().unwrap_or_default();

    let response = match state
        .upstream
        .embed(&state.config.embeddings_url(), &model, &payload)
        .await
    {
        EmbeddingOutcome::Success(body) => {
            metrics::record_request(EMBED_PATH, StatusCode::OK.as_u16());
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response()
        }
        EmbeddingOutcome::Unsupported { stub, cause } => {
            metrics::record_error(EMBED_PATH);
            metrics::record_request(EMBED_PATH, StatusCode::NOT_IMPLEMENTED.as_u16());
            match cause.status() {
                Some(status) => LogRecord::new("embed_unavailable")
                    .request_id(request_id)
                    .model_id(model)
                    .field("status", status.as_u16())
                    .warn(),
                None => LogRecord::new("embed_error")
                    .request_id(request_id)
                    .model_id(model)
                    .field("error", cause.to_string())
                    .error(),
            }
            (StatusCode::NOT_IMPLEMENTED, Json(stub)).into_response()
        }
    };

    metrics::record_latency(EMBED_PATH, started.elapsed());
    Ok(response)
}
