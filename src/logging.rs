use serde_json::{Map, Value};
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LogFormat;

/// 初始化日志，RUST_LOG 未设置时默认 info
pub fn init(format: LogFormat) {
    let filter = EnvFilter::new(std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().flatten_event(true))
            .init(),
        LogFormat::Text => registry.with(fmt::layer()).init(),
    }
}

/// 结构化日志记录，各字段由调用方显式填写
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub event: &'static str,
    pub request_id: Option<String>,
    pub model_id: Option<String>,
    pub extra: Map<String, Value>,
}

impl LogRecord {
    pub fn new(event: &'static str) -> Self {
        Self {
            event,
            request_id: None,
            model_id: None,
            extra: Map::new(),
        }
    }

    pub fn request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn model_id(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self
    }

    pub fn field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.extra.insert(key.to_string(), value.into());
        self
    }

    pub fn emit(&self, level: Level) {
        let request_id = self.request_id.as_deref();
        let model_id = self.model_id.as_deref();
        let extra = Value::Object(self.extra.clone());
        match level {
            Level::ERROR => {
                tracing::error!(request_id, model_id, extra = %extra, "{}", self.event)
            }
            Level::WARN => {
                tracing::warn!(request_id, model_id, extra = %extra, "{}", self.event)
            }
            Level::INFO => {
                tracing::info!(request_id, model_id, extra = %extra, "{}", self.event)
            }
            Level::DEBUG => {
                tracing::debug!(request_id, model_id, extra = %extra, "{}", self.event)
            }
            Level::TRACE => {
                tracing::trace!(request_id, model_id, extra = %extra, "{}", self.event)
            }
        }
    }

    pub fn info(&self) {
        self.emit(Level::INFO);
    }

    pub fn warn(&self) {
        self.emit(Level::WARN);
    }

    pub fn error(&self) {
        self.emit(Level::ERROR);
    }
}
