//! Prometheus 指标
//!
//! - `gateway_requests_total{path,status}`
//! - `gateway_request_latency_seconds{path}`
//! - `gateway_cache_hits_total{path}`
//! - `gateway_errors_total{path}`
//! - `gateway_tokens_total{path}`
//! - `gateway_tokens_per_second{path}`
//! - `gateway_upstream_retries_total`

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const REQUEST_LATENCY: &str = "gateway_request_latency_seconds";

/// 推理请求延迟分布较宽，缓存命中在百毫秒内，长生成可达数十秒
const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

/// 安装全局指标记录器，只能在启动时调用一次
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(REQUEST_LATENCY.to_string()), LATENCY_BUCKETS)?
        .install_recorder()?;

    describe_counter!("gateway_requests_total", "Total requests");
    describe_histogram!(REQUEST_LATENCY, "Latency per request");
    describe_counter!("gateway_cache_hits_total", "Cache hits");
    describe_counter!("gateway_errors_total", "Errors");
    describe_counter!("gateway_tokens_total", "Tokens generated");
    describe_gauge!("gateway_tokens_per_second", "Tokens per second");
    describe_counter!(
        "gateway_upstream_retries_total",
        "Upstream attempts that failed and were retried"
    );

    Ok(handle)
}

/// 未安装为全局记录器的句柄，渲染结果为空，用于测试
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

pub fn record_request(path: &'static str, status: u16) {
    counter!("gateway_requests_total", "path" => path, "status" => status.to_string())
        .increment(1);
}

pub fn record_latency(path: &'static str, latency: Duration) {
    histogram!(REQUEST_LATENCY, "path" => path).record(latency.as_secs_f64());
}

pub fn record_cache_hit(path: &'static str) {
    counter!("gateway_cache_hits_total", "path" => path).increment(1);
}

pub fn record_error(path: &'static str) {
    counter!("gateway_errors_total", "path" => path).increment(1);
}

pub fn record_tokens(path: &'static str, tokens: u64, latency: Duration) {
    counter!("gateway_tokens_total", "path" => path).increment(tokens);
    let secs = latency.as_secs_f64();
    if secs > 0.0 {
        gauge!("gateway_tokens_per_second", "path" => path).set(tokens as f64 / secs);
    }
}

pub fn record_upstream_retry() {
    counter!("gateway_upstream_retries_total").increment(1);
}
