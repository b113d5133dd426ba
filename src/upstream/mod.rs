//! 后端推理服务客户端：有界重试、指数退避，支持缓冲与流式两种模式。

mod client;
mod error;
mod retry;
mod stream;

pub use client::{BufferedResponse, EmbeddingOutcome, UpstreamClient};
pub use error::UpstreamError;
pub use retry::RetryPolicy;
pub use stream::{ChunkStream, relay};
