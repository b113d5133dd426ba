use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },

    #[error("{0}")]
    Invalid(String),
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "text" | "pretty" | "plain" => Ok(LogFormat::Text),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub backend_url: String,
    pub model_id: String,

    /// 为空时使用进程内缓存
    pub redis_url: String,
    /// 0 表示关闭响应缓存
    pub cache_ttl_secs: u64,
    pub cache_single_flight: bool,
    /// 单次缓存读写（含建连）的超时，超时视为未命中
    pub cache_timeout_ms: u64,
    /// 进程内缓存的最大条目数
    pub cache_max_entries: u64,

    pub rate_limit_rps: f64,
    pub rate_limit_burst: u32,
    pub rate_limit_idle_secs: u64,
    /// 0 表示不清理空闲令牌桶
    pub rate_limit_sweep_secs: u64,
    pub trust_proxy_headers: bool,
    pub request_size_limit_bytes: usize,

    pub max_tokens_cap: i64,
    pub denylist_words: Vec<String>,

    pub retry_attempts: u32,
    pub retry_min_secs: f64,
    pub retry_max_secs: f64,
    pub upstream_timeout_secs: u64,

    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: "0.0.0.0".to_string(),
            server_port: 8000,
            backend_url: "http://vllm:8000".to_string(),
            model_id: "Qwen/Qwen2-0.5B-Instruct".to_string(),
            redis_url: "redis://redis:6379/0".to_string(),
            cache_ttl_secs: 300,
            cache_single_flight: false,
            cache_timeout_ms: 500,
            cache_max_entries: 10_000,
            rate_limit_rps: 5.0,
            rate_limit_burst: 10,
            rate_limit_idle_secs: 600,
            rate_limit_sweep_secs: 60,
            trust_proxy_headers: false,
            request_size_limit_bytes: 1_000_000,
            max_tokens_cap: 512,
            denylist_words: vec!["hack".to_string(), "exploit".to_string()],
            retry_attempts: 3,
            retry_min_secs: 0.5,
            retry_max_secs: 3.0,
            upstream_timeout_secs: 60,
            log_format: LogFormat::Json,
        }
    }
}

impl Config {
    /// 从环境变量加载配置，所有变量均可选
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let defaults = Config::default();
        let config = Config {
            server_host: env::var("GATEWAY_HOST").unwrap_or(defaults.server_host),
            server_port: parse_var("GATEWAY_PORT", defaults.server_port)?,
            backend_url: env::var("GATEWAY_BACKEND_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(defaults.backend_url),
            model_id: env::var("GATEWAY_MODEL_ID").unwrap_or(defaults.model_id),
            redis_url: env::var("GATEWAY_REDIS_URL").unwrap_or(defaults.redis_url),
            cache_ttl_secs: parse_var("GATEWAY_CACHE_TTL_SECONDS", defaults.cache_ttl_secs)?,
            cache_single_flight: parse_bool_var(
                "GATEWAY_CACHE_SINGLE_FLIGHT",
                defaults.cache_single_flight,
            )?,
            cache_timeout_ms: parse_var("GATEWAY_CACHE_TIMEOUT_MS", defaults.cache_timeout_ms)?,
            cache_max_entries: parse_var(
                "GATEWAY_CACHE_MAX_ENTRIES",
                defaults.cache_max_entries,
            )?,
            rate_limit_rps: parse_var("GATEWAY_RATE_LIMIT_RPS", defaults.rate_limit_rps)?,
            rate_limit_burst: parse_var("GATEWAY_RATE_LIMIT_BURST", defaults.rate_limit_burst)?,
            rate_limit_idle_secs: parse_var(
                "GATEWAY_RATE_LIMIT_IDLE_SECONDS",
                defaults.rate_limit_idle_secs,
            )?,
            rate_limit_sweep_secs: parse_var(
                "GATEWAY_RATE_LIMIT_SWEEP_SECONDS",
                defaults.rate_limit_sweep_secs,
            )?,
            trust_proxy_headers: parse_bool_var(
                "GATEWAY_TRUST_PROXY_HEADERS",
                defaults.trust_proxy_headers,
            )?,
            request_size_limit_bytes: parse_var(
                "GATEWAY_REQUEST_SIZE_LIMIT_BYTES",
                defaults.request_size_limit_bytes,
            )?,
            max_tokens_cap: parse_var("GATEWAY_MAX_TOKENS_CAP", defaults.max_tokens_cap)?,
            denylist_words: match env::var("GATEWAY_DENYLIST_WORDS") {
                Ok(raw) => parse_word_list("GATEWAY_DENYLIST_WORDS", &raw)?,
                Err(_) => defaults.denylist_words,
            },
            retry_attempts: parse_var("GATEWAY_RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_min_secs: parse_var("GATEWAY_RETRY_MIN_SECONDS", defaults.retry_min_secs)?,
            retry_max_secs: parse_var("GATEWAY_RETRY_MAX_SECONDS", defaults.retry_max_secs)?,
            upstream_timeout_secs: parse_var(
                "GATEWAY_UPSTREAM_TIMEOUT_SECONDS",
                defaults.upstream_timeout_secs,
            )?,
            log_format: parse_var("GATEWAY_LOG_FORMAT", defaults.log_format)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "GATEWAY_RETRY_ATTEMPTS must be at least 1".into(),
            ));
        }
        if !self.rate_limit_rps.is_finite() || self.rate_limit_rps <= 0.0 {
            return Err(ConfigError::Invalid(
                "GATEWAY_RATE_LIMIT_RPS must be positive".into(),
            ));
        }
        if self.rate_limit_burst == 0 {
            return Err(ConfigError::Invalid(
                "GATEWAY_RATE_LIMIT_BURST must be at least 1".into(),
            ));
        }
        // 需能转换为 Duration：拒绝 NaN、无穷与溢出
        if Duration::try_from_secs_f64(self.retry_min_secs).is_err()
            || Duration::try_from_secs_f64(self.retry_max_secs).is_err()
        {
            return Err(ConfigError::Invalid(
                "GATEWAY_RETRY_MIN_SECONDS and GATEWAY_RETRY_MAX_SECONDS must be finite, non-negative seconds"
                    .into(),
            ));
        }
        if self.retry_min_secs < 0.0 || self.retry_min_secs > self.retry_max_secs {
            return Err(ConfigError::Invalid(
                "GATEWAY_RETRY_MIN_SECONDS must be between 0 and GATEWAY_RETRY_MAX_SECONDS".into(),
            ));
        }
        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "GATEWAY_UPSTREAM_TIMEOUT_SECONDS must be at least 1".into(),
            ));
        }
        if self.cache_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "GATEWAY_CACHE_TIMEOUT_MS must be at least 1".into(),
            ));
        }
        if self.cache_max_entries == 0 {
            return Err(ConfigError::Invalid(
                "GATEWAY_CACHE_MAX_ENTRIES must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_timeout(&self) -> Duration {
        Duration::from_millis(self.cache_timeout_ms)
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn retry_min(&self) -> Duration {
        Duration::from_secs_f64(self.retry_min_secs)
    }

    pub fn retry_max(&self) -> Duration {
        Duration::from_secs_f64(self.retry_max_secs)
    }

    pub fn rate_limit_idle(&self) -> Duration {
        Duration::from_secs(self.rate_limit_idle_secs)
    }

    pub fn rate_limit_sweep(&self) -> Option<Duration> {
        (self.rate_limit_sweep_secs > 0).then(|| Duration::from_secs(self.rate_limit_sweep_secs))
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.backend_url)
    }

    pub fn embeddings_url(&self) -> String {
        format!("{}/v1/embeddings", self.backend_url)
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        Err(_) => Ok(default),
    }
}

fn parse_bool_var(name: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(name) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue { name, value }),
        },
        Err(_) => Ok(default),
    }
}

/// 支持逗号分隔或 JSON 数组两种写法
pub fn parse_word_list(name: &'static str, raw: &str) -> Result<Vec<String>, ConfigError> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(trimmed).map_err(|_| {
            ConfigError::InvalidValue {
                name,
                value: raw.to_string(),
            }
        });
    }
    Ok(trimmed
        .split(',')
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect())
}
