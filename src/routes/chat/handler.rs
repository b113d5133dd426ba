use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{Extension, State, rejection::BytesRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use super::model::{CHAT_PATH, ChatOutcome, process_chat};
use crate::AppState;
use crate::error::RejectedRequest;
use crate::metrics;
use crate::middleware::{ClientKey, RequestId};
use crate::models::ChatRequest;
use crate::routes::parse_json_body;

pub async fn chat(
    State(state): State<AppState>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Extension(ClientKey(client_key)): Extension<ClientKey>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, RejectedRequest> {
    let started = Instant::now();

    let result = match parse_json_body::<ChatRequest>(body, state.admission.max_body_bytes()) {
        Ok(payload) => process_chat(&state, request_id.clone(), client_key, payload, started).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(outcome) => {
            metrics::record_request(CHAT_PATH, StatusCode::OK.as_u16());
            metrics::record_latency(CHAT_PATH, started.elapsed());
            Ok(outcome_response(outcome))
        }
        Err(e) => {
            metrics::record_request(CHAT_PATH, e.status().as_u16());
            metrics::record_latency(CHAT_PATH, started.elapsed());
            Err(e.with_request_id(request_id))
        }
    }
}

fn outcome_response(outcome: ChatOutcome) -> Response {
    match outcome {
        ChatOutcome::Cached(body) | ChatOutcome::Completed { body, .. } => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response(),
        ChatOutcome::Streaming(chunks) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
            ],
            Body::from_stream(chunks),
        )
            .into_response(),
    }
}
