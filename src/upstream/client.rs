use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use reqwest::{Client, Method, StatusCode, header};
use serde::Serialize;

use super::error::UpstreamError;
use super::retry::RetryPolicy;
use super::stream::{ChunkStream, relay};
use crate::models::EmbeddingStub;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 记录错误响应体时的最大长度
const ERROR_BODY_LIMIT: usize = 1024;

/// 缓冲模式下的后端响应
#[derive(Debug, Clone)]
pub struct BufferedResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// 向量接口结果：成功，或后端不支持时的降级响应
#[derive(Debug)]
pub enum EmbeddingOutcome {
    Success(Bytes),
    Unsupported {
        stub: EmbeddingStub,
        cause: UpstreamError,
    },
}

/// 后端推理服务客户端，内置重试
#[derive(Clone)]
pub struct UpstreamClient {
    http: Client,
    policy: RetryPolicy,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(policy: RetryPolicy, timeout: Duration) -> Result<Self, UpstreamError> {
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self {
            http,
            policy,
            timeout,
        })
    }

    /// 缓冲调用：每次尝试都有整体超时，重试对调用方透明
    pub async fn forward<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: &str,
        payload: &T,
    ) -> Result<BufferedResponse, UpstreamError> {
        let body = Bytes::from(serde_json::to_vec(payload)?);

        self.policy
            .run(|_| {
                let request = self
                    .http
                    .request(method.clone(), url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .timeout(self.timeout)
                    .body(body.clone());
                async move {
                    let response = request.send().await?;
                    let status = response.status();
                    if !status.is_success() {
                        return Err(status_error(response).await);
                    }
                    let body = response.bytes().await?;
                    Ok(BufferedResponse { status, body })
                }
            })
            .await
    }

    /// 流式调用：仅在建立连接并收到首个分块之前重试
    pub async fn stream<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
    ) -> Result<ChunkStream, UpstreamError> {
        let body = Bytes::from(serde_json::to_vec(payload)?);

        let (first, rest) = self
            .policy
            .run(|_| {
                let request = self
                    .http
                    .post(url)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body.clone());
                let open = async move {
                    let response = request.send().await?;
                    if !response.status().is_success() {
                        return Err(status_error(response).await);
                    }
                    let mut chunks = Box::pin(response.bytes_stream());
                    match chunks.next().await {
                        Some(Ok(first)) => Ok((Some(first), chunks)),
                        Some(Err(e)) => Err(UpstreamError::from(e)),
                        None => Ok((None, chunks)),
                    }
                };
                // 超时只约束到首个分块为止，之后的生成时长不受限
                let timeout = self.timeout;
                async move {
                    tokio::time::timeout(timeout, open).await.map_err(|_| {
                        UpstreamError::Transport(format!(
                            "no response within {}s",
                            timeout.as_secs_f64()
                        ))
                    })?
                }
            })
            .await?;

        Ok(relay(first, rest))
    }

    /// 向量接口：任何后端失败都降级为桩响应
    pub async fn embed<T: Serialize + ?Sized>(
        &self,
        url: &str,
        model: &str,
        payload: &T,
    ) -> EmbeddingOutcome {
        match self.forward(Method::POST, url, payload).await {
            Ok(response) => EmbeddingOutcome::Success(response.body),
            Err(cause) => EmbeddingOutcome::Unsupported {
                stub: EmbeddingStub::unavailable(model),
                cause,
            },
        }
    }
}

async fn status_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status();
    let body = match response.bytes().await {
        Ok(bytes) => {
            let end = bytes.len().min(ERROR_BODY_LIMIT);
            String::from_utf8_lossy(&bytes[..end]).into_owned()
        }
        Err(_) => String::new(),
    };
    UpstreamError::Status { status, body }
}
