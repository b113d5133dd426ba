use std::time::Instant;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::Method;
use serde_json::Value;

use crate::AppState;
use crate::cache::response_cache_key;
use crate::error::GatewayError;
use crate::logging::LogRecord;
use crate::metrics;
use crate::models::{ChatRequest, usage_tokens};
use crate::safety::SafetyFilter;
use crate::upstream::{ChunkStream, UpstreamError};

pub const CHAT_PATH: &str = "/chat";

/// 缓存键中的接口名
const CACHE_ENDPOINT: &str = "chat";

/// 单个请求的上下文，安全检查调整后不再修改
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: String,
    client_key: String,
    payload: ChatRequest,
    stream: bool,
}

impl RequestContext {
    /// 执行安全检查，被拦截时返回错误，需要截断时改写 max_tokens
    pub fn admit(
        request_id: String,
        client_key: String,
        mut payload: ChatRequest,
        safety: &SafetyFilter,
    ) -> Result<Self, GatewayError> {
        let verdict = safety.check(&payload);
        if !verdict.allowed {
            let reason = verdict.reason.unwrap_or(crate::safety::SafetyReason::Denylist);
            return Err(GatewayError::SafetyBlocked(reason));
        }
        if let Some(max_tokens) = verdict.adjusted_max_tokens {
            payload.max_tokens = Some(Value::from(max_tokens));
        }

        let stream = payload.is_stream();
        Ok(Self {
            request_id,
            client_key,
            payload,
            stream,
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn client_key(&self) -> &str {
        &self.client_key
    }

    pub fn payload(&self) -> &ChatRequest {
        &self.payload
    }

    pub fn is_stream(&self) -> bool {
        self.stream
    }

    pub fn model_id(&self) -> &str {
        self.payload.model_id()
    }
}

pub enum ChatOutcome {
    Cached(Bytes),
    Completed { body: Bytes, tokens: u64 },
    Streaming(ChunkStream),
}

/// 安全检查 → 缓存查询（仅非流式）→ 转发 → 写缓存
pub async fn process_chat(
    state: &AppState,
    request_id: String,
    client_key: String,
    payload: ChatRequest,
    started: Instant,
) -> Result<ChatOutcome, GatewayError> {
    let payload = payload.with_default_model(&state.config.model_id);
    let ctx = match RequestContext::admit(request_id.clone(), client_key, payload, &state.safety) {
        Ok(ctx) => ctx,
        Err(e) => {
            LogRecord::new("safety_blocked")
                .request_id(request_id)
                .model_id(state.config.model_id.clone())
                .field("reason", e.code())
                .info();
            return Err(e);
        }
    };

    let url = state.config.chat_completions_url();

    if ctx.is_stream() {
        let chunks = state
            .upstream
            .stream(&url, ctx.payload())
            .await
            .map_err(|e| upstream_failure(&ctx, e))?;
        return Ok(ChatOutcome::Streaming(watch_stream(&ctx, chunks)));
    }

    let key = if state.cache.is_enabled() {
        match response_cache_key(CACHE_ENDPOINT, ctx.model_id(), ctx.payload()) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to build cache key, bypassing cache");
                None
            }
        }
    } else {
        None
    };

    if let Some(key) = &key {
        if let Some(hit) = state.cache.lookup(key).await {
            return Ok(cache_hit(&ctx, hit));
        }
    }

    // 开启单飞时，拿到锁后再查一次缓存
    let flight = match &key {
        Some(key) => state.cache.begin_flight(key).await,
        None => None,
    };
    if let (Some(key), Some(_)) = (&key, &flight) {
        if let Some(hit) = state.cache.lookup(key).await {
            return Ok(cache_hit(&ctx, hit));
        }
    }

    let response = state
        .upstream
        .forward(Method::POST, &url, ctx.payload())
        .await
        .map_err(|e| upstream_failure(&ctx, e))?;

    let tokens = serde_json::from_slice::<Value>(&response.body)
        .ok()
        .map(|body| usage_tokens(&body));
    metrics::record_tokens(CHAT_PATH, tokens.unwrap_or(0), started.elapsed());

    // 无法解析的响应不写入缓存
    if let (Some(key), Some(_)) = (&key, tokens) {
        state.cache.store(key, response.body.clone()).await;
    }
    drop(flight);

    LogRecord::new("chat_response")
        .request_id(ctx.request_id())
        .model_id(ctx.model_id())
        .field("client", ctx.client_key())
        .field("cached", false)
        .field("tokens", tokens.unwrap_or(0))
        .info();

    Ok(ChatOutcome::Completed {
        body: response.body,
        tokens: tokens.unwrap_or(0),
    })
}

fn cache_hit(ctx: &RequestContext, body: Bytes) -> ChatOutcome {
    metrics::record_cache_hit(CHAT_PATH);
    LogRecord::new("cache_hit")
        .request_id(ctx.request_id())
        .model_id(ctx.model_id())
        .field("path", CHAT_PATH)
        .info();
    ChatOutcome::Cached(body)
}

fn upstream_failure(ctx: &RequestContext, error: UpstreamError) -> GatewayError {
    metrics::record_error(CHAT_PATH);
    let mut record = LogRecord::new("upstream_error")
        .request_id(ctx.request_id())
        .model_id(ctx.model_id())
        .field("client", ctx.client_key())
        .field("error", error.to_string())
        .field("attempts", error.attempts())
        .field("stream", ctx.is_stream());
    if let Some(status) = error.status() {
        record = record.field("status", status.as_u16());
    }
    record.error();
    GatewayError::UpstreamUnavailable(error)
}

/// 首块之后的中断只记录，不重试
fn watch_stream(ctx: &RequestContext, chunks: ChunkStream) -> ChunkStream {
    let request_id = ctx.request_id().to_string();
    let model_id = ctx.model_id().to_string();
    Box::pin(chunks.inspect(move |chunk| {
        if let Err(e) = chunk {
            metrics::record_error(CHAT_PATH);
            LogRecord::new("stream_error")
                .request_id(request_id.clone())
                .model_id(model_id.clone())
                .field("error", e.to_string())
                .error();
        }
    }))
}
